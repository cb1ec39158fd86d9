//! Resolves a class against a list of class path entries and prints the
//! order in which it and its nested classes would be defined.
//!
//! ```text
//! classpath_probe com.example.Foo target/classes 'lib/*' agent.jar
//! RUST_LOG=debug classpath_probe com.example.Foo target/classes
//! ```

use std::env;
use std::process::ExitCode;
use std::time::Instant;

use jvmti_classpool::injector::injection_order;
use jvmti_classpool::pool::PoolHierarchy;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let Some(class_name) = args.next() else {
        eprintln!("usage: classpath_probe CLASS_NAME PATH...");
        return ExitCode::from(2);
    };
    let paths: Vec<String> = args.collect();

    let pools = PoolHierarchy::new("rootClassPool", "childClassPool", None, &paths);
    let start = Instant::now();
    let descriptor = match pools.resolve(&class_name) {
        Ok(descriptor) => descriptor,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let order = match injection_order(pools.child(), &descriptor) {
        Ok(order) => order,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let elapsed = start.elapsed();

    let header = descriptor.header();
    println!("class={}", descriptor.name());
    println!("location={}", descriptor.location());
    println!("pool={}", descriptor.pool_name());
    println!("version={}.{}", header.major_version, header.minor_version);
    println!("constructors={}", header.constructors().collect::<Vec<_>>().join(" "));
    for (index, item) in order.iter().enumerate() {
        println!("define[{index}]={} ({} bytes)", item.name(), item.bytecode().len());
    }
    println!("resolve_time_us={}", elapsed.as_micros());
    ExitCode::SUCCESS
}
