//! booklens entry point: backend server and command-line client.

use booklens::{
    auth::AuthService,
    catalog::{Data4Library, GoogleBooks},
    client::{ApiClient, AuthSession, LocalLibrary, Storage},
    config::{Cli, Command, Config, PostCommand, ShelfCommand, UserCommand},
    db::Database,
    library::{NewShelfEntry, PostingDraft},
    map::{self, LocationKind},
    server,
};
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Find or load config
    let config_path = cli.config.clone().or_else(Config::find_config_file);

    let mut config = if let Some(ref path) = config_path {
        Config::load(path)?
    } else {
        Config::default()
    };
    config.apply_env_overrides();

    // Handle command
    match cli.command {
        Some(Command::Init { force }) => cmd_init(force).await,
        Some(Command::User { action }) => cmd_user(action, &config).await,
        Some(Command::Serve { bind }) => cmd_serve(config, bind).await,
        Some(Command::Login { email, password }) => cmd_login(&config, &email, password).await,
        Some(Command::Signup {
            email,
            name,
            password,
        }) => cmd_signup(&config, &email, name, password).await,
        Some(Command::Logout) => cmd_logout(&config).await,
        Some(Command::Whoami) => cmd_whoami(&config).await,
        Some(Command::Search { query }) => cmd_search(&config, &query).await,
        Some(Command::Isbn { isbn }) => cmd_isbn(&config, &isbn).await,
        Some(Command::Holdings { isbn }) => cmd_holdings(&config, &isbn).await,
        Some(Command::Locations { kind }) => cmd_locations(kind.as_deref()),
        Some(Command::Shelf { action }) => cmd_shelf(action, &config),
        Some(Command::Post { action }) => cmd_post(action, &config).await,
        None => {
            // Default: start server
            cmd_serve(config, None).await
        }
    }
}

/// Initialize config and database.
async fn cmd_init(force: bool) -> anyhow::Result<()> {
    let config_path = PathBuf::from("config.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    // Write default config
    std::fs::write(&config_path, Config::generate_default())?;
    println!("Created config file: {}", config_path.display());

    // Initialize database
    let config = Config::default();
    if let Some(parent) = config.database.path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let _db = Database::open(&config.database.path)?;
    println!("Initialized database: {}", config.database.path.display());

    println!("\nEdit config.toml to add API keys and OAuth clients.");
    println!("Then run: booklens serve");

    Ok(())
}

fn auth_service(config: &Config, db: Database) -> AuthService {
    AuthService::new(
        db,
        config.auth.session_days,
        config.auth.registration_enabled(),
        config.auth.min_password_len,
    )
}

/// User management commands.
async fn cmd_user(action: UserCommand, config: &Config) -> anyhow::Result<()> {
    let db = Database::open(&config.database.path)?;
    let auth = auth_service(config, db);

    match action {
        UserCommand::Add {
            email,
            name,
            password,
        } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password("Password: ")?,
            };

            let user = auth.create_user(&email, &password, name.as_deref().unwrap_or(""))?;
            println!("Created user: {} ({}, id: {})", user.email, user.name, user.id);
        }

        UserCommand::Del { email } => {
            if auth.delete_user(&email)? {
                println!("Deleted user: {}", email);
            } else {
                println!("User not found: {}", email);
            }
        }

        UserCommand::List => {
            let users = auth.list_users()?;
            if users.is_empty() {
                println!("No users found.");
            } else {
                println!(
                    "{:<30} {:<20} {:<8} {:<36} LAST LOGIN",
                    "EMAIL", "NAME", "PROVIDER", "ID"
                );
                println!("{}", "-".repeat(110));
                for user in users {
                    let last_login = user
                        .last_login
                        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "never".to_string());
                    println!(
                        "{:<30} {:<20} {:<8} {:<36} {}",
                        user.email, user.name, user.provider, user.id, last_login
                    );
                }
            }
        }

        UserCommand::Passwd { email, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password("New password: ")?,
            };

            if auth.change_password(&email, &password)? {
                println!("Password changed for: {}", email);
            } else {
                println!("User not found: {}", email);
            }
        }
    }

    Ok(())
}

/// Start the server.
async fn cmd_serve(mut config: Config, bind: Option<std::net::SocketAddr>) -> anyhow::Result<()> {
    // Override bind address if specified
    if let Some(addr) = bind {
        config.server.bind = addr;
    }

    init_tracing();

    // Open database
    if let Some(parent) = config.database.path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db = Database::open(&config.database.path)?;

    // Create auth service
    let auth = auth_service(&config, db.clone());

    tracing::info!(
        bind = %config.server.bind,
        database = %config.database.path.display(),
        "Starting booklens server"
    );

    // Create application state
    let state = server::AppState::new_with_db(config.clone(), db, auth)?;
    if let Err(e) = state.cleanup() {
        tracing::warn!(error = %e, "Failed to remove expired sessions");
    }

    // Create router
    let app = server::create_router(state);

    let listener = TcpListener::bind(config.server.bind).await?;
    tracing::info!(address = %config.server.bind, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "booklens=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

// ========== CLIENT ==========

fn open_storage(path: &PathBuf) -> anyhow::Result<Storage> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Storage::open(path)?)
}

fn auth_session(config: &Config) -> anyhow::Result<AuthSession<ApiClient>> {
    let storage = open_storage(&config.client.session_file)?;
    Ok(AuthSession::new(
        ApiClient::new(&config.client.api_base_url),
        storage,
    ))
}

/// Log in against the backend.
async fn cmd_login(config: &Config, email: &str, password: Option<String>) -> anyhow::Result<()> {
    let password = match password {
        Some(p) => p,
        None => prompt_password("Password: ")?,
    };

    let mut session = auth_session(config)?;
    let user = session.login(email, &password).await?;
    println!("Logged in as {} ({})", user.name, user.email);
    Ok(())
}

/// Create an account on the backend.
async fn cmd_signup(
    config: &Config,
    email: &str,
    name: Option<String>,
    password: Option<String>,
) -> anyhow::Result<()> {
    let password = match password {
        Some(p) => p,
        None => prompt_password("Password: ")?,
    };

    let mut session = auth_session(config)?;
    let user = session
        .signup(email, &password, name.as_deref().unwrap_or(""))
        .await?;
    println!("Signed up as {} ({})", user.name, user.email);
    Ok(())
}

/// Drop the stored session.
async fn cmd_logout(config: &Config) -> anyhow::Result<()> {
    let mut session = auth_session(config)?;
    session.logout().await?;
    println!("Logged out.");
    Ok(())
}

/// Show who the stored session belongs to.
async fn cmd_whoami(config: &Config) -> anyhow::Result<()> {
    let mut session = auth_session(config)?;
    match session.restore().await? {
        Some(user) => println!("{} <{}> via {}", user.name, user.email, user.provider),
        None => println!("Not logged in."),
    }
    Ok(())
}

fn catalog_http() -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(concat!("booklens/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Free text catalog search.
async fn cmd_search(config: &Config, query: &str) -> anyhow::Result<()> {
    let books = GoogleBooks::new(
        catalog_http()?,
        config.catalog.google_books_url.clone(),
        config.catalog.google_books_api_key.clone(),
    );

    let volumes = books.search(query).await;
    if volumes.is_empty() {
        println!("No books found.");
        return Ok(());
    }
    for volume in volumes {
        println!("{:<14} {} / {}", volume.isbn, volume.title, volume.author);
    }
    Ok(())
}

/// Catalog lookup by ISBN.
async fn cmd_isbn(config: &Config, isbn: &str) -> anyhow::Result<()> {
    let books = GoogleBooks::new(
        catalog_http()?,
        config.catalog.google_books_url.clone(),
        config.catalog.google_books_api_key.clone(),
    );

    let volume = books.search_by_isbn(isbn).await?;
    println!("{}", serde_json::to_string_pretty(&volume)?);
    Ok(())
}

/// Libraries holding a book.
async fn cmd_holdings(config: &Config, isbn: &str) -> anyhow::Result<()> {
    let holdings = Data4Library::new(
        catalog_http()?,
        config.catalog.data4library_url.clone(),
        config.catalog.data4library_api_key.clone(),
    );

    let libraries = holdings.libraries_by_isbn(isbn).await?;
    if libraries.is_empty() {
        println!("No library holds this book.");
        return Ok(());
    }
    for lib in libraries {
        println!("{:<30} {:<15} {}", lib.lib_name, lib.tel, lib.address);
    }
    Ok(())
}

/// Demo map markers.
fn cmd_locations(kind: Option<&str>) -> anyhow::Result<()> {
    let kind = kind.and_then(LocationKind::parse_filter);
    for loc in map::filter_locations(kind) {
        println!(
            "{:<3} {:<20} {:>9.4} {:>9.4} {}",
            loc.id, loc.name, loc.lat, loc.lng, loc.address
        );
    }
    Ok(())
}

fn local_library(config: &Config) -> anyhow::Result<LocalLibrary> {
    Ok(LocalLibrary::new(open_storage(&config.client.local_file)?))
}

/// Local shelf commands.
fn cmd_shelf(action: ShelfCommand, config: &Config) -> anyhow::Result<()> {
    let mut library = local_library(config)?;

    match action {
        ShelfCommand::Add {
            title,
            author,
            genre,
            pages,
            return_date,
        } => {
            let entry = library.add_book(NewShelfEntry {
                title,
                author,
                genre: genre.unwrap_or_default(),
                total_pages: pages,
                is_rental: return_date.is_some(),
                return_date,
                ..Default::default()
            })?;
            println!("Added: {} ({})", entry.title, entry.id);
        }

        ShelfCommand::List => {
            let books = library.books();
            if books.is_empty() {
                println!("Shelf is empty.");
            } else {
                println!("{:<36} {:<10} {:>4} TITLE", "ID", "STATUS", "%");
                println!("{}", "-".repeat(80));
                for book in books {
                    println!(
                        "{:<36} {:<10} {:>4} {} / {}",
                        book.id,
                        book.status.as_str(),
                        book.progress,
                        book.title,
                        book.author
                    );
                }
            }
        }

        ShelfCommand::Progress { id, percent } => {
            let entry = library.set_progress(&id, percent)?;
            println!("{}: {}%", entry.title, entry.progress);
        }

        ShelfCommand::Memo { id, text } => {
            let entry = library.set_memo(&id, &text)?;
            println!("Memo saved for {}", entry.title);
        }

        ShelfCommand::Complete { id } => {
            let entry = library.complete_book(&id)?;
            println!("Completed: {}", entry.title);
        }

        ShelfCommand::Remove { id } => {
            if library.remove_book(&id)? {
                println!("Removed: {}", id);
            } else {
                println!("Book not found: {}", id);
            }
        }

        ShelfCommand::Stats => {
            let stats = library.stats();
            println!("Total:      {}", stats.total_books);
            println!("Reading:    {}", stats.reading);
            println!("Completed:  {}", stats.completed);
            println!("Completion: {}%", stats.completion_rate);
        }
    }

    Ok(())
}

/// Local posting commands.
async fn cmd_post(action: PostCommand, config: &Config) -> anyhow::Result<()> {
    let mut library = local_library(config)?;

    match action {
        PostCommand::Write {
            book_id,
            content,
            title,
            rating,
            tags,
        } => {
            // Signed-in users post under their own name
            let session = auth_session(config)?;
            let draft = PostingDraft {
                title: title.unwrap_or_default(),
                content,
                rating,
                tags,
            };
            let posting = library.write_posting(&book_id, draft, session.user())?;
            println!("Posted: {} ({})", posting.title, posting.id);
        }

        PostCommand::Edit {
            id,
            content,
            title,
            rating,
            tags,
        } => {
            let current = library
                .postings(None)
                .into_iter()
                .find(|p| p.id == id)
                .ok_or_else(|| anyhow::anyhow!("Posting not found: {}", id))?;

            let mut draft = PostingDraft::from_posting(&current);
            if let Some(content) = content {
                draft.content = content;
            }
            if let Some(title) = title {
                draft.title = title;
            }
            if let Some(rating) = rating {
                draft.rating = rating;
            }
            if let Some(tags) = tags {
                draft.tags = tags;
            }

            let posting = library.edit_posting(&id, draft)?;
            println!("Updated: {}", posting.title);
        }

        PostCommand::List { book_id } => {
            let postings = library.postings(book_id.as_deref());
            if postings.is_empty() {
                println!("No postings yet.");
            }
            for p in postings {
                println!(
                    "[{}] {} ({}) by {} {}",
                    "★".repeat(p.rating as usize),
                    p.title,
                    p.book_title,
                    p.author_name,
                    p.created_at.format("%Y-%m-%d")
                );
                println!("    {}", p.content);
                if !p.tags.is_empty() {
                    println!("    #{}", p.tags.join(" #"));
                }
            }
        }
    }

    Ok(())
}

/// Prompt for password input.
fn prompt_password(prompt: &str) -> anyhow::Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut password = String::new();
    io::stdin().read_line(&mut password)?;

    Ok(password.trim().to_string())
}
