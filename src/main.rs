use anyhow::{bail, Context, Result};
use itertools::Itertools;
use log::debug;
use structopt::StructOpt;

use labloan::forms::{self, RequestForm};
use labloan::receipts::ReceiptKind;
use labloan::{identity_candidates, reconcile, Client, ReceiptBoard, SessionStore};

#[derive(Debug, StructOpt)]
#[structopt(name = "labloan", about = "Campus equipment and room borrowing client")]
struct Opt {
    /// Base URL of the borrowing service API
    #[structopt(
        long,
        env = "LABLOAN_API_URL",
        default_value = "http://10.108.149.164:8000/api"
    )]
    api_url: String,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Log in and persist the session
    Login {
        #[structopt(long)]
        email: String,
        /// Read from stdin when not given
        #[structopt(long)]
        password: Option<String>,
    },
    /// List borrowable items
    Items {
        /// Case-insensitive name filter
        #[structopt(long)]
        search: Option<String>,
    },
    /// List bookable rooms
    Rooms,
    /// Submit an item borrow request
    Borrow {
        /// Item id, as shown by `items`
        item_id: i64,
        #[structopt(flatten)]
        form: FormOpt,
    },
    /// Submit a room reservation
    Reserve {
        /// Room name, as shown by `rooms`
        room: String,
        #[structopt(flatten)]
        form: FormOpt,
    },
    /// Show your item and room requests
    Receipts,
    /// Cancel one of your requests
    Cancel {
        /// "item" or "room"
        kind: ReceiptKind,
        id: String,
    },
    /// Show the cached identity
    Profile,
    /// Clear the session token
    Logout,
}

#[derive(Debug, StructOpt)]
struct FormOpt {
    /// Full name
    #[structopt(long)]
    name: String,
    /// Student ID number
    #[structopt(long)]
    id_number: String,
    #[structopt(long, possible_values = &forms::YEAR_LEVELS)]
    year: String,
    #[structopt(long, possible_values = &forms::DEPARTMENTS)]
    department: String,
    /// Course code within the department
    #[structopt(long)]
    course: String,
    /// YYYY-MM-DD
    #[structopt(long)]
    date: String,
    /// HH:mm
    #[structopt(long)]
    time_in: String,
    /// HH:mm
    #[structopt(long)]
    time_out: String,
}

impl From<FormOpt> for RequestForm {
    fn from(opt: FormOpt) -> Self {
        RequestForm {
            name: opt.name,
            borrower_id: opt.id_number,
            year: opt.year,
            department: opt.department,
            course: opt.course,
            date: opt.date,
            time_in: opt.time_in,
            time_out: opt.time_out,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    pretty_env_logger::init();
    let opt = Opt::from_args();
    let store = SessionStore::open()?;
    let client = Client::new(&opt.api_url, store)?;

    match opt.command {
        Command::Login { email, password } => login(&client, &email, password).await,
        Command::Items { search } => list_items(&client, search).await,
        Command::Rooms => list_rooms(&client).await,
        Command::Borrow { item_id, form } => borrow(&client, item_id, form.into()).await,
        Command::Reserve { room, form } => reserve(&client, &room, form.into()).await,
        Command::Receipts => show_receipts(&client).await,
        Command::Cancel { kind, id } => cancel(&client, kind, &id).await,
        Command::Profile => profile(client.store()),
        Command::Logout => logout(client.store()),
    }
}

fn prompt_password() -> Result<String> {
    use std::io::{BufRead, Write};
    print!("Password: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password")?;
    Ok(line.trim_end().to_owned())
}

async fn login(client: &Client, email: &str, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => prompt_password()?,
    };
    let outcome = client.login(email, &password).await?;
    client
        .store()
        .save_session(&outcome.token, Some(email), outcome.user.as_ref())?;
    println!("{}", outcome.message.as_deref().unwrap_or("Logged in"));
    Ok(())
}

async fn list_items(client: &Client, search: Option<String>) -> Result<()> {
    let needle = search.map(|s| s.to_lowercase());
    let items = client
        .items()
        .await?
        .into_iter()
        .filter(|i| {
            needle
                .as_ref()
                .map_or(true, |n| i.name.to_lowercase().contains(n))
        })
        .collect_vec();
    if items.is_empty() {
        println!("No items available");
        return Ok(());
    }
    for item in items {
        println!(
            "{:>4}  {:<30} qty {:<4} {}",
            item.id,
            item.name,
            item.qty,
            item.description.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

async fn list_rooms(client: &Client) -> Result<()> {
    let rooms = client.rooms().await?;
    if rooms.is_empty() {
        println!("No rooms available");
        return Ok(());
    }
    for room in rooms {
        println!("{:>4}  {:<30} qty {}", room.id, room.name, room.quantity);
    }
    Ok(())
}

async fn borrow(client: &Client, item_id: i64, form: RequestForm) -> Result<()> {
    let borrower_id = form.borrower_id.clone();
    let request = form.into_borrow_request(item_id)?;
    client.submit_borrow(&request).await?;
    client.store().save_borrower_id(&borrower_id)?;
    println!("Request submitted successfully!");
    Ok(())
}

async fn reserve(client: &Client, room_name: &str, form: RequestForm) -> Result<()> {
    let rooms = client.rooms().await?;
    let room = match rooms.iter().find(|r| r.name == room_name) {
        Some(room) => room,
        None => bail!("Room '{}' not found", room_name),
    };
    let borrower_id = form.borrower_id.clone();
    let request = form.into_room_request(room.id)?;
    client.submit_reservation(&request).await?;
    client.store().save_borrower_id(&borrower_id)?;
    println!("Room booking request submitted successfully!");
    Ok(())
}

/// Fetch both request collections together and reconcile them against the
/// stored identity. Either fetch failing fails the whole view.
async fn load_receipts(client: &Client) -> Result<ReceiptBoard> {
    let store = client.store();
    let user = store.user();
    let candidates = identity_candidates(
        user.as_ref(),
        store.email().as_deref(),
        store.borrower_id().as_deref(),
    );
    debug!("matching against {} identity candidates", candidates.len());
    let (item_records, room_records) =
        tokio::try_join!(client.borrow_requests(), client.room_requests())?;
    Ok(ReceiptBoard::new(reconcile(
        item_records,
        room_records,
        &candidates,
    )))
}

async fn show_receipts(client: &Client) -> Result<()> {
    let board = load_receipts(client).await?;
    if board.receipts().is_empty() {
        println!("No requests found");
        return Ok(());
    }
    println!(
        "{:<5} {:<8} {:<12} {:<9} {:<9} NAME",
        "TYPE", "ID", "DATE", "IN", "OUT"
    );
    for receipt in board.receipts() {
        println!(
            "{:<5} {:<8} {:<12} {:<9} {:<9} {}",
            receipt.kind.to_string(),
            receipt.id().unwrap_or_else(|| "-".to_owned()),
            receipt.date(),
            receipt.time_in(),
            receipt.time_out(),
            receipt.borrower_name().unwrap_or_default()
        );
    }
    Ok(())
}

async fn cancel(client: &Client, kind: ReceiptKind, id: &str) -> Result<()> {
    let mut board = load_receipts(client).await?;
    board.begin_cancel(kind, id);
    match client.cancel(kind, id).await {
        Ok(()) => {
            board.cancel_succeeded(kind, id);
            println!(
                "Cancelled {} request {}. {} request(s) remaining",
                kind,
                id,
                board.receipts().len()
            );
            Ok(())
        }
        Err(e) => {
            board.cancel_failed(kind, id);
            Err(e.into())
        }
    }
}

fn profile(store: &SessionStore) -> Result<()> {
    println!("Email: {}", store.display_email());
    if let Some(user) = store.user() {
        if let Some(name) = user.name.as_deref() {
            println!("Name:  {}", name);
        }
        if let Some(id) = user.display_id() {
            println!("Id:    {}", id);
        }
    }
    match store.token() {
        Some(_) => println!("Session: active"),
        None => println!("Session: logged out"),
    }
    Ok(())
}

fn logout(store: &SessionStore) -> Result<()> {
    store.clear_token()?;
    println!("Logged out");
    Ok(())
}
