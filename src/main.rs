use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use estate_sync::config::AppConfig;
use estate_sync::error::AppError;
use estate_sync::listings::{
    ActorId, BearerToken, Confirmation, HttpGateway, InMemoryGateway, MutationCoordinator,
    PropertyDraft, PropertyType, ReconcileMode, RemoteGateway, Role, RoleSession,
    SessionSnapshot, SessionView,
};
use estate_sync::telemetry;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "estate-sync",
    about = "Keep listings, applications, and wishlists in sync for agents and buyers",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run an agent and a buyer session against an in-memory backend
    Demo(DemoArgs),
    /// Load one session from the remote API and print its derived views as JSON
    Snapshot(SnapshotArgs),
}

#[derive(Args, Debug)]
struct DemoArgs {
    /// Reconciliation strategy (defaults to APP_RECONCILE_MODE)
    #[arg(long, value_parser = parse_mode)]
    mode: Option<ReconcileMode>,
    /// Only list properties of this type (apartment, house, room)
    #[arg(long = "type", value_parser = parse_property_type)]
    property_type: Option<PropertyType>,
}

#[derive(Args, Debug)]
struct SnapshotArgs {
    /// Session role (agent or buyer)
    #[arg(long, value_parser = parse_role)]
    role: Role,
    /// Server-side identity of the actor
    #[arg(long)]
    actor: String,
    /// Bearer token issued at login
    #[arg(long)]
    token: String,
    /// Only list properties of this type (apartment, house, room)
    #[arg(long = "type", value_parser = parse_property_type)]
    property_type: Option<PropertyType>,
    /// Override APP_API_BASE_URL
    #[arg(long)]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let mut config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    match cli.command {
        Command::Demo(args) => {
            let mode = args.mode.unwrap_or(config.sync.reconcile_mode);
            run_demo(mode, args.property_type).await
        }
        Command::Snapshot(args) => {
            if let Some(base_url) = args.base_url.clone() {
                config.gateway.base_url = base_url;
            }
            let gateway = Arc::new(HttpGateway::new(&config.gateway)?);
            let session = RoleSession::new(
                ActorId::new(args.actor),
                args.role,
                BearerToken::new(args.token),
            );
            info!(
                environment = ?config.environment,
                base_url = gateway.base_url(),
                "loading remote session"
            );
            let coordinator =
                MutationCoordinator::new(gateway, session, config.sync.reconcile_mode);
            let snapshot = load_snapshot(&coordinator, args.property_type).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
    }
}

async fn load_snapshot<G: RemoteGateway + 'static>(
    coordinator: &MutationCoordinator<G>,
    property_type: Option<PropertyType>,
) -> Result<SessionSnapshot, AppError> {
    coordinator.refresh_all().await?;
    let mut view = SessionView::new(coordinator.session()).with_type_filter(property_type);
    let store = coordinator.store().read();
    Ok(view.read(&store).clone())
}

async fn run_demo(
    mode: ReconcileMode,
    property_type: Option<PropertyType>,
) -> Result<(), AppError> {
    println!("Listing sync demo (reconcile mode: {mode})");

    let gateway = Arc::new(InMemoryGateway::new());
    gateway.register("agent-token", ActorId::new("agent-1"), Role::Agent);
    gateway.register("buyer-token", ActorId::new("buyer-1"), Role::Buyer);

    let agent = MutationCoordinator::new(
        gateway.clone(),
        RoleSession::agent("agent-1", "agent-token"),
        mode,
    );
    let buyer = MutationCoordinator::new(
        gateway.clone(),
        RoleSession::buyer("buyer-1", "buyer-token"),
        mode,
    );

    agent.refresh_all().await?;
    let loft = agent
        .create_property(draft("Riverside loft", 1450.0, PropertyType::Apartment))
        .await?;
    let cottage = agent
        .create_property(draft("Garden cottage", 2100.0, PropertyType::House))
        .await?;
    let studio = agent
        .create_property(draft("Campus room", 650.0, PropertyType::Room))
        .await?;
    println!("\nAgent listed {}, {}, {}", loft.id, cottage.id, studio.id);

    if let Err(err) = agent
        .create_property(draft("Free parking spot", 0.0, PropertyType::Room))
        .await
    {
        println!("Rejected locally ({:?}): {err}", err.kind());
    }

    buyer.refresh_all().await?;
    buyer.add_to_wishlist(&cottage.id).await?;
    let loft_application = buyer.apply(&loft.id).await?;
    buyer.apply(&cottage.id).await?;
    println!(
        "Buyer applied to {} and {}, wishlisted {}",
        loft.id, cottage.id, cottage.id
    );

    agent.refresh_all().await?;
    agent.approve(&loft_application.id).await?;
    if let Err(err) = agent.reject(&loft_application.id).await {
        println!("Second decision refused ({:?}): {err}", err.kind());
    }
    agent.delete_property(&studio.id, Confirmation::Confirmed).await?;

    buyer.refresh_all().await?;
    print_snapshot("Buyer view", &buyer, property_type);
    print_snapshot("Agent view", &agent, property_type);
    Ok(())
}

fn print_snapshot<G: RemoteGateway + 'static>(
    title: &str,
    coordinator: &MutationCoordinator<G>,
    property_type: Option<PropertyType>,
) {
    let mut view = SessionView::new(coordinator.session()).with_type_filter(property_type);
    let store = coordinator.store().read();
    let snapshot = view.read(&store);

    println!("\n{title} ({} {})", snapshot.role, snapshot.actor);
    for card in &snapshot.listings {
        let status = card
            .application_status
            .map(|status| status.label())
            .unwrap_or("-");
        println!(
            "- {:<18} {:>8.2} {:<10} wishlisted={} application={} applications={}",
            card.property.title,
            card.property.price,
            card.property.property_type.label(),
            card.wishlisted,
            status,
            card.application_count,
        );
    }
    println!(
        "Applications: {} pending, {} approved, {} rejected",
        snapshot.pending.len(),
        snapshot.approved.len(),
        snapshot.rejected.len()
    );
    if !snapshot.wishlist.is_empty() {
        let titles: Vec<_> = snapshot
            .wishlist
            .iter()
            .map(|property| property.title.as_str())
            .collect();
        println!("Wishlist: {}", titles.join(", "));
    }
}

fn draft(title: &str, price: f64, property_type: PropertyType) -> PropertyDraft {
    PropertyDraft {
        title: title.to_string(),
        description: format!("{} listed through the demo", title),
        price,
        location: "Des Moines, IA".to_string(),
        property_type,
    }
}

fn parse_mode(raw: &str) -> Result<ReconcileMode, String> {
    ReconcileMode::parse(raw).ok_or_else(|| format!("'{raw}' is not one of patch, refetch"))
}

fn parse_role(raw: &str) -> Result<Role, String> {
    Role::parse(raw).ok_or_else(|| format!("'{raw}' is not one of agent, buyer"))
}

fn parse_property_type(raw: &str) -> Result<PropertyType, String> {
    PropertyType::parse(raw).ok_or_else(|| format!("'{raw}' is not one of apartment, house, room"))
}
