//! FlowUp Demo
//!
//! Launches a line of peers holding the values 0, 10, 20, ... and lets
//! them average until the run horizon, printing the watcher's reports.
//!
//! Configuration comes from the `FLOWUP_*` environment variables;
//! `FLOWUP_DEMO_PEERS` sets the line length. With `FLOWUP_VIRTUAL_TIME=1`
//! the whole horizon runs on paused tokio time and finishes instantly.

use flowup_core::{Message, PeerId, Topology, Transport};
use flowup_runtime::{init_logging, Clock, Deployment, RuntimeConfig, TokioClock};

const DEFAULT_PEERS: u64 = 5;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = RuntimeConfig::from_env()?;
    init_logging(&config.log)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(config.virtual_time)
        .build()?;
    runtime.block_on(run(config))
}

async fn run(config: RuntimeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let peers = match std::env::var("FLOWUP_DEMO_PEERS") {
        Ok(v) => v.trim().parse()?,
        Err(_) => DEFAULT_PEERS,
    };

    println!("FlowUp demo: {peers} peers in a line, strategy {}", config.strategy);
    println!(
        "tick {:?}, timeout {} ticks, horizon {:?}",
        config.tick_interval, config.tick_timeout, config.run_until
    );
    println!();

    let topology = Topology::line(peers);
    let values: Vec<f64> = (0..peers).map(|i| i as f64 * 10.0).collect();
    let template = config.peer_config(0.0, Vec::new());
    let deployment = Deployment::from_topology(&topology, &values, &template)?.launch()?;

    let clock = TokioClock::new();
    let snapshot = deployment
        .watcher()
        .run(&clock, config.watch_interval, config.run_until)
        .await;

    // Ask the first peer directly, the way an outside observer would
    if peers > 0 {
        let observer = PeerId::new(u64::MAX);
        let transport = deployment.transport();
        transport.register(observer);

        let query = Message::QueryLastAvg {
            requester: observer,
        };
        transport.send(PeerId::new(0), query, query.size_hint())?;
        clock.sleep(config.tick_interval * 2).await;

        match transport.try_receive(observer)? {
            Some(Message::LastAvgReport { sender, last_avg }) => {
                println!("{sender} reports last_avg = {last_avg:.6}")
            }
            other => println!("no report from peer-0 ({other:?})"),
        }
    }

    println!("{}", snapshot.to_json()?);
    if let (Some(mean), Some(deviation)) = (snapshot.true_mean(), snapshot.max_deviation()) {
        println!("true mean {mean:.6}, max deviation {deviation:.3e}");
    }

    deployment.shutdown().await;
    println!("Simulation finished");
    Ok(())
}
