use std::path::PathBuf;

use clap::{Parser, Subcommand};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use petden_core::models::NewContact;
use petden_core::{Config, Fault, PetService};

#[derive(Parser)]
#[command(name = "petden", version, about = "Adopt a virtual pet and keep it happy")]
struct Cli {
    /// Path to the SQLite database file (overrides config and PETDEN_DB)
    #[arg(long)]
    db: Option<String>,

    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account
    Signup {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Log in and print a bearer token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Adopt one of the catalog pets (see `petden catalog`)
    Assign {
        /// Catalog choice, e.g. pet1
        choice: String,
        #[arg(long, env = "PETDEN_TOKEN", hide_env_values = true)]
        token: String,
    },
    /// Show your pet's current stats
    Stats {
        #[arg(long, env = "PETDEN_TOKEN", hide_env_values = true)]
        token: String,
    },
    /// Feed, play with, or care for your pet
    Interact {
        /// One of: feed, play, care
        action: String,
        #[arg(long, env = "PETDEN_TOKEN", hide_env_values = true)]
        token: String,
    },
    /// List every adopted pet
    Pets,
    /// Show a user and their pet
    User {
        id: i64,
    },
    /// Leave a message for the shelter
    Contact {
        #[arg(long)]
        email: String,
        #[arg(long)]
        message: String,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, default_value = "")]
        interest: String,
        /// Subscribe to the newsletter
        #[arg(long)]
        newsletter: bool,
    },
    /// List stored contact messages
    Contacts,
    /// Show the pets available for adoption
    Catalog,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        let code = match e.fault() {
            Fault::Client | Fault::NotFound => 2,
            Fault::Server => {
                log::error!("{}", e);
                1
            }
        };
        eprintln!("Error: {}", e);
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> petden_core::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    let svc = PetService::from_config(&config)?;
    let json = cli.json;

    match cli.command {
        Commands::Signup { username, email, password } => {
            let user = svc.signup(&username, &email, &password)?;
            if json {
                return print_json(&user);
            }
            println!(
                "User created: {} <{}> (id {})",
                user.username,
                user.email,
                user.id.unwrap_or_default()
            );
            Ok(())
        }
        Commands::Login { email, password } => {
            let login = svc.login(&email, &password)?;
            if json {
                return print_json(&login);
            }
            println!("Login successful (user {})", login.user_id);
            println!("{}", login.token);
            Ok(())
        }
        Commands::Assign { choice, token } => {
            let user_id = svc.authenticate(&token)?;
            let pet = svc.assign_pet(user_id, &choice)?;
            if json {
                return print_json(&pet);
            }
            println!("Pet assigned successfully: {} ({})", pet.kind, pet.photo);
            Ok(())
        }
        Commands::Stats { token } => {
            let user_id = svc.authenticate(&token)?;
            let view = svc.pet_stats(user_id)?;
            if json {
                return print_json(&view);
            }
            println!("{} ({})", view.kind, view.photo);
            print_stats(view.hunger, view.happiness, view.energy, view.last_interaction);
            Ok(())
        }
        Commands::Interact { action, token } => {
            let user_id = svc.authenticate(&token)?;
            let view = svc.interact(user_id, &action)?;
            if json {
                return print_json(&view);
            }
            println!("{}", view.message);
            print_stats(view.hunger, view.happiness, view.energy, view.last_interaction);
            Ok(())
        }
        Commands::Pets => cmd_pets(&svc, json),
        Commands::User { id } => {
            let profile = svc.get_user(id)?;
            if json {
                return print_json(&profile);
            }
            println!("=== {} ===", profile.username);
            println!("Email:    {}", profile.email);
            println!("Joined:   {}", profile.created_at.format("%Y-%m-%d"));
            match profile.pet {
                Some(pet) => {
                    println!("Pet:      {} ({})", pet.kind, pet.photo);
                    let (h, p, e) = pet.stats.rounded();
                    print_stats(h, p, e, pet.last_interaction);
                }
                None => println!("Pet:      none yet"),
            }
            Ok(())
        }
        Commands::Contact { email, message, name, interest, newsletter } => {
            let saved = svc.submit_contact(&NewContact {
                name,
                email,
                interest,
                message,
                newsletter,
            })?;
            if json {
                return print_json(&saved);
            }
            println!("Contact message received successfully");
            Ok(())
        }
        Commands::Contacts => cmd_contacts(&svc, json),
        Commands::Catalog => {
            let entries = svc.catalog();
            if json {
                return print_json(&entries);
            }
            let mut table = new_table(vec!["Choice", "Type", "Photo"]);
            for e in entries {
                table.add_row(vec![e.choice.as_str(), e.kind.as_str(), e.photo.as_str()]);
            }
            println!("{table}");
            Ok(())
        }
    }
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> petden_core::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_stats(
    hunger: i64,
    happiness: i64,
    energy: i64,
    last_interaction: Option<chrono::DateTime<chrono::Utc>>,
) {
    println!("Hunger:    {:>3}", hunger);
    println!("Happiness: {:>3}", happiness);
    println!("Energy:    {:>3}", energy);
    match last_interaction {
        Some(t) => println!("Last interaction: {}", t.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("Last interaction: never"),
    }
}

fn cmd_pets(svc: &PetService, json: bool) -> petden_core::Result<()> {
    let pets = svc.list_pets()?;
    if json {
        return print_json(&pets);
    }
    if pets.is_empty() {
        println!("No pets adopted yet. Run 'petden assign <choice>' first.");
        return Ok(());
    }

    let mut table = new_table(vec!["Owner", "Email", "Type", "Hunger", "Happiness", "Energy"]);
    for listing in &pets {
        let (h, p, e) = listing.pet.stats.rounded();
        table.add_row(vec![
            listing.username.clone(),
            listing.email.clone(),
            listing.pet.kind.to_string(),
            h.to_string(),
            p.to_string(),
            e.to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn cmd_contacts(svc: &PetService, json: bool) -> petden_core::Result<()> {
    let contacts = svc.list_contacts()?;
    if json {
        return print_json(&contacts);
    }
    if contacts.is_empty() {
        println!("No contact messages.");
        return Ok(());
    }

    let mut table = new_table(vec![
        "Received",
        "Name",
        "Email",
        "Interest",
        "Newsletter",
        "Message",
    ]);
    for c in &contacts {
        table.add_row(vec![
            c.created_at.format("%Y-%m-%d %H:%M").to_string(),
            c.name.clone(),
            c.email.clone(),
            c.interest.clone(),
            if c.newsletter { "yes" } else { "no" }.to_string(),
            c.message.clone(),
        ]);
    }
    println!("{table}");
    Ok(())
}
