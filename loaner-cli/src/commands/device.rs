//! Device commands: provision a device and list the fleet.

use crate::error::CliError;
use crate::output::{print_records, DeviceRecord};
use crate::utils::{GlobalOptions, Session};
use clap::{Args, Subcommand};
use loaner::config::OutputFormat;
use loaner::{Device, NewDevice, Tier};

/// Manage devices.
#[derive(Args)]
pub struct DeviceCommand {
    #[command(subcommand)]
    pub action: DeviceAction,
}

/// Device subcommands.
#[derive(Subcommand)]
pub enum DeviceAction {
    /// Provision a device
    Add(DeviceAddArgs),

    /// List devices
    List(DeviceListArgs),
}

/// Arguments for `device add`.
#[derive(Args)]
pub struct DeviceAddArgs {
    /// Manufacturer
    #[arg(long)]
    pub brand: String,

    /// Model name
    #[arg(long)]
    pub model: String,

    /// Storage capacity in gigabytes
    #[arg(long, value_name = "GB")]
    pub capacity_gb: u32,

    /// Memory size in gigabytes
    #[arg(long, value_name = "GB")]
    pub ram_gb: u32,

    /// Performance tier (default: derived from --ram-gb)
    #[arg(long, value_name = "TIER")]
    pub tier: Option<Tier>,
}

/// Arguments for `device list`.
#[derive(Args)]
pub struct DeviceListArgs {
    /// Only devices of this tier
    #[arg(long, value_name = "TIER")]
    pub tier: Option<Tier>,

    /// Only devices that can be loaned right now
    #[arg(long)]
    pub available: bool,

    /// Output format (table, json, csv)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,
}

impl DeviceCommand {
    /// Execute the device command.
    pub fn execute(self, global: &GlobalOptions) -> Result<(), CliError> {
        let session = Session::open(global)?;
        match self.action {
            DeviceAction::Add(args) => add(&session, global, args),
            DeviceAction::List(args) => list(&session, args),
        }
    }
}

fn add(session: &Session, global: &GlobalOptions, args: DeviceAddArgs) -> Result<(), CliError> {
    let tier = args
        .tier
        .unwrap_or_else(|| Tier::classify(args.ram_gb, session.config.high_min_ram_gb()));
    let device = session.manager.register_device(NewDevice::new(
        args.brand,
        args.model,
        args.capacity_gb,
        args.ram_gb,
        tier,
    ))?;

    println!("{}", device.id());
    if !global.quiet {
        eprintln!(
            "Registered {} {} ({} tier)",
            device.brand(),
            device.model(),
            device.tier()
        );
        // Provisioning may have served the head of the queue
        if let Some(loan) = session
            .manager
            .active_reservations()
            .into_iter()
            .find(|r| r.device_id() == device.id())
        {
            eprintln!(
                "Assigned to waiting requester {} (reservation {})",
                loan.requester_id(),
                loan.id()
            );
        }
    }
    Ok(())
}

fn list(session: &Session, args: DeviceListArgs) -> Result<(), CliError> {
    let devices = match (args.tier, args.available) {
        (Some(tier), true) => session.manager.available_devices(tier),
        (None, true) => {
            let mut free: Vec<_> = Tier::ALL
                .into_iter()
                .flat_map(|tier| session.manager.available_devices(tier))
                .collect();
            free.sort_by_key(Device::id);
            free
        }
        (tier, false) => session
            .manager
            .devices()
            .into_iter()
            .filter(|d| tier.map_or(true, |t| d.tier() == t))
            .collect(),
    };

    let records: Vec<DeviceRecord> = devices.iter().map(DeviceRecord::from).collect();
    print_records(
        args.format.unwrap_or_else(|| session.config.output_format()),
        &records,
    )
}
