//! Migration receiver CLI.
//!
//! Loads a VM from its configuration, waits for one migration, resumes the
//! received state one instruction past the source's `MIGRATE` and runs it to
//! completion.
//!
//! # Usage
//! ```text
//! migration_server -v <vm.conf> [--listen <addr:port>]
//! ```

use minivmm::hypervisor::config::VmConfig;
use minivmm::network::migration::receive_into;
use minivmm::network::tcp_transport::TcpMigrationListener;
use minivmm::network::transport::MIGRATION_PORT;
use minivmm::virtual_machine::vm::{SliceStop, VmRole};
use minivmm::{error, info, warn};
use std::env;
use std::net::SocketAddr;
use std::process;

const USAGE: &str = "\
Migration Server

USAGE:
    {program} -v <vm.conf> [OPTIONS]

OPTIONS:
    -v, --vm <file>              VM configuration file (must name the source's program)
    -l, --listen <addr:port>     Address to accept the migration on (defaults to 0.0.0.0:8080)
    -h, --help                   Print this help message
";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args: Vec<String> = env::args().collect();

    let mut config_path: Option<String> = None;
    let mut listen = SocketAddr::from(([0, 0, 0, 0], MIGRATION_PORT));

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            k @ ("--vm" | "-v") => {
                i += 1;
                if i >= args.len() {
                    error!("{k} requires an argument");
                    process::exit(1);
                }
                config_path = Some(args[i].clone());
            }
            k @ ("--listen" | "-l") => {
                i += 1;
                if i >= args.len() {
                    error!("{k} requires an argument");
                    process::exit(1);
                }
                listen = args[i].parse().unwrap_or_else(|_| {
                    error!("Invalid listen address: '{}'", args[i]);
                    process::exit(1);
                });
            }
            other => {
                error!("Unknown argument: {other}");
                print_usage(&args[0]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let Some(config_path) = config_path else {
        error!("A VM configuration (-v) is required");
        print_usage(&args[0]);
        process::exit(1);
    };

    let config = VmConfig::from_file(&config_path).unwrap_or_else(|e| {
        error!("{e}");
        process::exit(1);
    });
    let mut vm = config
        .build_vm("Migrated Machine", VmRole::Destination)
        .unwrap_or_else(|e| {
            error!("{e}");
            process::exit(1);
        });

    let listener = TcpMigrationListener::bind(listen).await.unwrap_or_else(|e| {
        error!("Failed to listen on {listen}: {e}");
        process::exit(1);
    });
    info!("Waiting for migration on {listen}");

    if let Err(e) = receive_into(&listener, &mut vm).await {
        error!("Migration failed: {e}");
        process::exit(1);
    }
    if vm.is_finished() {
        warn!(
            "Resume point {} is past the end of the {} instruction program",
            vm.pc(),
            vm.program_len()
        );
    }

    loop {
        let report = vm.run_slice().unwrap_or_else(|e| {
            error!("{}: {e}", vm.name());
            process::exit(1);
        });
        for dump in &report.dumps {
            println!("{dump}");
        }
        match report.stop {
            SliceStop::SliceExhausted => continue,
            SliceStop::Finished => break,
            // Destination VMs never halt on MIGRATE.
            SliceStop::MigrationRequested(_) => break,
        }
    }

    info!("{} finished", vm.name());
    println!("{}", vm.dump_state());
}

fn print_usage(program: &str) {
    info!("{}", USAGE.replace("{program}", program));
}
