use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use parkade_common::{GateId, LicensePlate};
use parkade_facility::domain::membership::RegistrationRequest;
use parkade_facility::domain::pricing::default_policy;
use parkade_facility::domain::sessions::{
    CheckInRequest, CheckOutRequest, LostTicketRequest, ParkingSession,
};
use parkade_facility::domain::types::{PaymentMethod, PolicyId, SessionId, TicketId, ZoneId};
use parkade_facility::domain::zones::Zone;
use parkade_facility::{Facility, FacilityConfig};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Parser)]
#[command(name = "parkadectl", version, about = "Parkade facility CLI")]
struct Cli {
    /// Config file path (defaults to ./parkade.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(flatten)]
    verbosity: Verbosity<InfoLevel>,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Check a vehicle in at an entry gate
    CheckIn {
        #[arg(long)]
        plate: String,
        #[arg(long, default_value = "CAR")]
        vehicle_type: String,
        #[arg(long)]
        gate: String,
        #[arg(long)]
        card: Option<String>,
    },
    /// Check a vehicle out and compute the fee
    CheckOut {
        #[arg(long)]
        plate: String,
        #[arg(long)]
        ticket: Option<String>,
        #[arg(long)]
        card: Option<String>,
        #[arg(long)]
        gate: String,
    },
    /// Lost-ticket checkout with the flat penalty applied
    LostTicket {
        #[arg(long)]
        plate: String,
        #[arg(long)]
        vehicle_type: Option<String>,
        #[arg(long)]
        gate: String,
        #[arg(long, default_value = "attendant")]
        reported_by: String,
    },
    /// Request settlement of a pending fee
    Settle {
        #[arg(long)]
        session: String,
        #[arg(long, default_value = "online_qr")]
        method: String,
    },
    /// Apply a gateway confirmation callback to a session
    Confirm {
        #[arg(long)]
        session: String,
        #[arg(long)]
        transaction: String,
        #[arg(long)]
        failed: bool,
        #[arg(long)]
        gate: Option<String>,
    },
    /// Cancel the in-flight payment attempt for a session
    CancelPayment {
        #[arg(long)]
        session: String,
        #[arg(long, default_value = "cancelled by operator")]
        reason: String,
    },
    /// Monthly membership operations
    #[command(subcommand)]
    Member(MemberCmd),
    /// List configured zones with live occupancy
    Zones,
    /// Seed the data directory with a starter layout
    Init,
    /// Expire overdue monthly tickets once
    Sweep,
}

#[derive(Subcommand)]
enum MemberCmd {
    Register {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        plate: String,
        #[arg(long, default_value = "CAR")]
        vehicle_type: String,
        #[arg(long)]
        policy: Option<String>,
        #[arg(long, default_value_t = 1)]
        months: u32,
    },
    Extend {
        #[arg(long)]
        ticket: String,
        #[arg(long, default_value_t = 1)]
        months: u32,
    },
    Confirm {
        #[arg(long)]
        ticket: String,
        #[arg(long)]
        transaction: String,
        #[arg(long)]
        failed: bool,
    },
    Cancel {
        #[arg(long)]
        ticket: String,
        #[arg(long)]
        admin: bool,
    },
    Approve {
        #[arg(long)]
        ticket: String,
    },
}

fn session_json(session: &ParkingSession) -> serde_json::Value {
    serde_json::json!({
        "session_id": session.id.to_string(),
        "plate": session.vehicle.plate.to_string(),
        "vehicle_type": session.vehicle.category.code(),
        "ticket_id": session.ticket.id.to_string(),
        "ticket_type": session.ticket.ticket_type.to_string(),
        "zone": session.zone_id.to_string(),
        "status": session.status.to_string(),
        "entry_time": session.entry_time,
        "exit_time": session.exit_time,
        "fee_amount": session.fee_amount.to_string(),
        "base_fee": session.base_fee.map(|a| a.to_string()),
        "lost_ticket_fee": session.lost_ticket_fee.map(|a| a.to_string()),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    parkade_common::logging::init_cli_logging(&cli.verbosity, "parkade=info")?;

    let config = FacilityConfig::load(cli.config.clone())?;
    let facility = Facility::open(&config)?;

    match cli.cmd {
        Cmd::CheckIn {
            plate,
            vehicle_type,
            gate,
            card,
        } => {
            let session = facility
                .sessions
                .check_in(CheckInRequest {
                    plate: LicensePlate::new(plate)?,
                    vehicle_type_code: vehicle_type,
                    gate_id: GateId::new(gate)?,
                    card_id: card,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&session_json(&session))?);
        }
        Cmd::CheckOut {
            plate,
            ticket,
            card,
            gate,
        } => {
            let session = facility
                .sessions
                .check_out(CheckOutRequest {
                    plate: LicensePlate::new(plate)?,
                    ticket_id: ticket.map(TicketId::new),
                    card_id: card,
                    gate_id: GateId::new(gate)?,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&session_json(&session))?);
        }
        Cmd::LostTicket {
            plate,
            vehicle_type,
            gate,
            reported_by,
        } => {
            let session = facility
                .sessions
                .lost_ticket(LostTicketRequest {
                    plate: LicensePlate::new(plate)?,
                    vehicle_type_code: vehicle_type,
                    gate_id: GateId::new(gate)?,
                    reported_by,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&session_json(&session))?);
        }
        Cmd::Settle { session, method } => {
            let session_id = SessionId::from_str(&session)?;
            let method = PaymentMethod::from_str(&method).map_err(anyhow::Error::msg)?;
            let outcome = facility.payments.settle(session_id, method).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Cmd::Confirm {
            session,
            transaction,
            failed,
            gate,
        } => {
            let session_id = SessionId::from_str(&session)?;
            let gate = gate.map(GateId::new).transpose()?;
            let session = facility
                .payments
                .confirm(session_id, &transaction, !failed, None, gate)
                .await?;
            println!("{}", serde_json::to_string_pretty(&session_json(&session))?);
        }
        Cmd::CancelPayment { session, reason } => {
            let session_id = SessionId::from_str(&session)?;
            let session = facility.payments.cancel(session_id, &reason).await?;
            println!("{}", serde_json::to_string_pretty(&session_json(&session))?);
        }
        Cmd::Member(cmd) => run_member(&facility, cmd).await?,
        Cmd::Zones => {
            let zones = facility.repos.zones.list_zones().await?;
            let mut items = Vec::with_capacity(zones.len());
            for zone in &zones {
                let occupied = facility.repos.sessions.count_occupied_in_zone(&zone.id).await?;
                items.push(serde_json::json!({
                    "zone": zone.id.to_string(),
                    "vehicle_category": zone.vehicle_category,
                    "electric_only": zone.electric_only,
                    "capacity": zone.capacity,
                    "occupied": occupied,
                }));
            }
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        Cmd::Init => {
            let (_, store) = parkade_facility::storage::Repositories::from_json(&config.data_dir)?;
            store.seed(starter_zones()?, vec![default_policy()]).await?;
            println!("seeded {} with starter zones and the default policy", config.data_dir.display());
        }
        Cmd::Sweep => {
            let expired = facility.scanner.sweep().await?;
            println!("{}", serde_json::json!({ "expired": expired }));
        }
    }
    Ok(())
}

async fn run_member(facility: &Facility, cmd: MemberCmd) -> Result<()> {
    let ticket = match cmd {
        MemberCmd::Register {
            phone,
            name,
            plate,
            vehicle_type,
            policy,
            months,
        } => {
            facility
                .membership
                .register(RegistrationRequest {
                    phone,
                    name,
                    plate: LicensePlate::new(plate)?,
                    vehicle_type_code: vehicle_type,
                    policy_id: policy.map(PolicyId::new),
                    months,
                })
                .await?
        }
        MemberCmd::Extend { ticket, months } => {
            facility
                .membership
                .extend(&TicketId::new(ticket), months)
                .await?
        }
        MemberCmd::Confirm {
            ticket,
            transaction,
            failed,
        } => {
            facility
                .membership
                .confirm_payment(&TicketId::new(ticket), &transaction, !failed, None)
                .await?
        }
        MemberCmd::Cancel { ticket, admin } => {
            facility
                .membership
                .request_cancellation(&TicketId::new(ticket), admin)
                .await?
        }
        MemberCmd::Approve { ticket } => {
            facility
                .membership
                .approve_cancellation(&TicketId::new(ticket))
                .await?
        }
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "ticket_id": ticket.id.to_string(),
            "plate": ticket.vehicle_plate.to_string(),
            "status": ticket.status.to_string(),
            "start_date": ticket.start_date,
            "expiry_date": ticket.expiry_date,
            "monthly_fee": ticket.monthly_fee.to_string(),
            "transaction_code": ticket.transaction_code,
            "qr_content": ticket.qr_content,
        }))?
    );
    Ok(())
}

fn starter_zones() -> Result<Vec<Zone>> {
    let all_gates: Vec<GateId> = Vec::new();
    Ok(vec![
        Zone {
            id: ZoneId::new("Z-CAR-1"),
            vehicle_category: "CAR".to_string(),
            electric_only: false,
            capacity: 50,
            gate_ids: all_gates.clone(),
            price_policy_id: Some(default_policy().id),
        },
        Zone {
            id: ZoneId::new("Z-CAR-EV"),
            vehicle_category: "ELECTRIC_CAR".to_string(),
            electric_only: true,
            capacity: 10,
            gate_ids: all_gates.clone(),
            price_policy_id: Some(default_policy().id),
        },
        Zone {
            id: ZoneId::new("Z-BIKE-1"),
            vehicle_category: "MOTORBIKE".to_string(),
            electric_only: false,
            capacity: 100,
            gate_ids: all_gates,
            price_policy_id: Some(default_policy().id),
        },
    ])
}
