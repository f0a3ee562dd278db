//! Minimal virtual machine monitor.
//!
//! Runs one or more VMs round-robin until each finishes, migrates away or
//! fails, then prints every VM's final registers.
//!
//! # Usage
//! ```text
//! minivmm -v <vm.conf> [-v <vm.conf>] [OPTIONS]
//! ```
//!
//! # Options
//! - `-v, --vm <file>`: VM configuration file (repeatable, one VM each)
//! - `-s, --snapshot <file>`: Snapshot to restore into the VM of the same position
//! - `--port <n>`: Port migrations are sent to (defaults to 8080)
//!
//! Set `MINIVMM_LOG=debug` to log every instruction and context switch.

use minivmm::hypervisor::config::VmConfig;
use minivmm::hypervisor::scheduler::Scheduler;
use minivmm::network::tcp_transport::TcpTransport;
use minivmm::network::transport::MIGRATION_PORT;
use minivmm::storage::snapshot_store::{self, SnapshotLoad};
use minivmm::virtual_machine::vm::{VirtualMachine, VmRole};
use minivmm::{error, info};
use std::env;
use std::process;

const USAGE: &str = "\
Minimal Virtual Machine Monitor

USAGE:
    {program} -v <vm.conf> [-v <vm.conf>] [OPTIONS]

OPTIONS:
    -v, --vm <file>          VM configuration file (repeatable)
    -s, --snapshot <file>    Snapshot restored into the VM at the same position
        --port <n>           Destination port for migrations (defaults to 8080)
    -h, --help               Print this help message

CONFIGURATION:
    vm_exec_slice_in_instructions=<n>    Instructions per slice (required, > 0)
    vm_binary=<path>                     Program file (required)
    vm_opcode_case=exact|insensitive     Mnemonic matching (defaults to exact)

EXAMPLES:
    # Two VMs, the first restored from a snapshot
    {program} -v vm1.conf -v vm2.conf -s vm1.snap
";

struct Args {
    configs: Vec<String>,
    snapshots: Vec<String>,
    port: u16,
}

fn parse_args(args: &[String]) -> Args {
    let mut parsed = Args {
        configs: Vec::new(),
        snapshots: Vec::new(),
        port: MIGRATION_PORT,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            k @ ("--vm" | "-v" | "--snapshot" | "-s" | "--port") => {
                i += 1;
                if i >= args.len() {
                    error!("{k} requires an argument");
                    process::exit(1);
                }
                let value = args[i].clone();
                match k {
                    "--vm" | "-v" => parsed.configs.push(value),
                    "--snapshot" | "-s" => parsed.snapshots.push(value),
                    _ => {
                        parsed.port = value.parse::<u16>().unwrap_or_else(|_| {
                            error!("Invalid port: '{value}'");
                            process::exit(1);
                        });
                    }
                }
            }
            other => {
                error!("Unknown argument: {other}");
                print_usage(&args[0]);
                process::exit(1);
            }
        }
        i += 1;
    }

    if parsed.configs.is_empty() {
        error!("At least one VM configuration (-v) is required");
        print_usage(&args[0]);
        process::exit(1);
    }
    if parsed.snapshots.len() > parsed.configs.len() {
        error!(
            "{} snapshots given for {} VMs",
            parsed.snapshots.len(),
            parsed.configs.len()
        );
        process::exit(1);
    }
    parsed
}

fn build_vm(index: usize, config_path: &str, snapshot: Option<&String>) -> VirtualMachine {
    let name = format!("Virtual Machine {}", index + 1);

    let config = VmConfig::from_file(config_path).unwrap_or_else(|e| {
        error!("{name}: {e}");
        process::exit(1);
    });
    let mut vm = config.build_vm(&name, VmRole::Source).unwrap_or_else(|e| {
        error!("{name}: {e}");
        process::exit(1);
    });

    if let Some(path) = snapshot {
        match snapshot_store::load(path) {
            Ok(SnapshotLoad::Restored(registers)) => {
                vm.restore_registers(registers);
                info!("{name}: registers restored from {path}");
            }
            Ok(SnapshotLoad::ColdStart) => info!("{name}: no snapshot at {path}, cold start"),
            Err(e) => {
                error!("{name}: {e}");
                process::exit(1);
            }
        }
    }

    info!(
        "{name}: {} instructions, slice {}",
        vm.program_len(),
        vm.slice()
    );
    vm
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args: Vec<String> = env::args().collect();
    let args = parse_args(&args);

    let mut scheduler = Scheduler::new(TcpTransport::new(args.port));
    for (i, config) in args.configs.iter().enumerate() {
        scheduler.add(build_vm(i, config, args.snapshots.get(i)));
    }

    let report = scheduler.run().await;

    for (summary, vm) in report.statuses.iter().zip(scheduler.into_vms()) {
        info!(
            "{}: {} after {} slices",
            summary.name, summary.status, summary.slices
        );
        println!("{}", vm.dump_state());
    }
    for failure in &report.failures {
        error!("{}: {}", failure.name, failure.error);
    }

    if report.has_failures() {
        process::exit(1);
    }
}

fn print_usage(program: &str) {
    info!("{}", USAGE.replace("{program}", program));
}
