use clap::Parser;

use partyserver::config::DEFAULT_DATABASE_URL;
use partyserver::db;
use partyserver::error::AppError;
use partyserver::middleware::auth::{hash_password, verify_password};
use partyserver::models::item_type::CreateItemType;
use partyserver::models::party::CreateParty;

/// Create a demo admin and a potluck party with a few item types.
#[derive(Parser, Debug)]
#[command(name = "party-seed", version)]
struct Args {
    /// SQLite database to seed.
    #[arg(long, default_value = DEFAULT_DATABASE_URL)]
    database_url: String,

    #[arg(long, default_value = "host")]
    username: String,

    #[arg(long, default_value = "partytime")]
    password: String,

    #[arg(long, default_value = "Neighbourhood Potluck")]
    title: String,

    /// Item types as NAME:CAPACITY pairs.
    #[arg(
        long = "item",
        value_delimiter = ',',
        default_value = "Drinks:3,Dessert:2,Salad:2,Chips & Dip:1"
    )]
    items: Vec<String>,
}

fn parse_item(raw: &str) -> Result<CreateItemType, String> {
    let (name, capacity) = raw
        .rsplit_once(':')
        .ok_or_else(|| format!("item {raw:?} must look like NAME:CAPACITY"))?;
    let capacity = capacity
        .trim()
        .parse()
        .map_err(|_| format!("item {raw:?} has an invalid capacity"))?;
    Ok(CreateItemType {
        name: Some(name.trim().to_string()),
        capacity: Some(capacity),
        sort_order: None,
    })
}

/// Reuse the admin if the username exists and the password matches.
async fn ensure_admin(
    pool: &sqlx::SqlitePool,
    username: &str,
    password: &str,
) -> Result<String, AppError> {
    if let Some((admin_id, stored_hash)) = db::admins::get_credentials(pool, username).await? {
        if !verify_password(password, &stored_hash)? {
            return Err(AppError::Unauthorized(format!(
                "admin {username} exists with a different password"
            )));
        }
        return Ok(admin_id);
    }

    let admin = db::admins::create_admin(pool, username, &hash_password(password)?).await?;
    Ok(admin.id)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "partyserver=info".into()),
        )
        .init();

    let args = Args::parse();
    let items = args
        .items
        .iter()
        .map(|raw| parse_item(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let pool = db::create_pool(&args.database_url, 1).await?;
    let admin_id = ensure_admin(&pool, &args.username, &args.password).await?;

    let starts_at = chrono::Utc::now() + chrono::Duration::days(7);
    let (party, invite) = db::parties::create_party(
        &pool,
        &admin_id,
        &CreateParty {
            title: Some(args.title.clone()),
            starts_at: Some(partyserver::models::format_timestamp(starts_at)),
            is_potluck: Some(true),
            description: Some("Bring something to share.".to_string()),
            ..Default::default()
        },
    )
    .await?;

    for item in &items {
        db::item_types::define_item_type(&pool, &party.id, item).await?;
    }

    println!("admin     {}", args.username);
    println!("party     {} ({})", party.title, party.id);
    println!("invite    {}", invite.code);
    println!("items     {}", items.len());

    Ok(())
}
