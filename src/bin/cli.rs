use clap::{Parser, Subcommand};
use minauth::{
    config::AppConfig,
    db,
    repositories::user_repository::SqliteUserRepository,
    services::{
        create_email_service,
        email_service::reset_link,
        user_service::{SignupRequest, UpdatePasswordRequest, UserService},
        PasswordResetService,
    },
};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "minauth-cli")]
#[command(about = "CLI tool for managing minauth accounts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// User management commands
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a new user
    Create {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// Password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// List all users
    List {
        /// Maximum number of users to display
        #[arg(short, long, default_value_t = 100)]
        limit: i64,

        /// Offset for pagination
        #[arg(short = 'o', long, default_value_t = 0)]
        offset: i64,
    },

    /// Set a new password for a user
    ResetPassword {
        /// Email address of the user
        #[arg(short, long)]
        email: String,

        /// New password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Issue a password reset link and print it
    IssueReset {
        /// Email address of the user
        #[arg(short, long)]
        email: String,
    },
}

fn get_password(prompt: &str) -> Result<String, Box<dyn std::error::Error>> {
    use std::io::{self, Write};
    print!("{}: ", prompt);
    io::stdout().flush()?;

    Ok(rpassword::read_password()?)
}

fn confirm_password(prompt: &str) -> Result<(String, String), Box<dyn std::error::Error>> {
    let password = get_password(prompt)?;
    let confirm = get_password("Confirm password")?;
    Ok((password, confirm))
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("❌ {}", message);
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    let pool = db::create_pool(&config).await?;
    db::run_migrations(&pool).await?;

    let user_repository = Arc::new(SqliteUserRepository::new(pool));
    let user_service = UserService::new(user_repository.clone());

    match cli.command {
        Commands::User { command } => match command {
            UserCommands::Create {
                name,
                email,
                password,
            } => {
                let (password, password_confirm) = match password {
                    Some(pw) => (pw.clone(), pw),
                    None => confirm_password("Password")?,
                };

                let request = SignupRequest {
                    name,
                    email,
                    password,
                    password_confirm: Some(password_confirm),
                };

                match user_service.create_user(request).await {
                    Ok(user) => {
                        println!("✅ User created successfully!");
                        println!("  ID: {}", user.id);
                        println!("  Name: {}", user.name);
                        println!("  Email: {}", user.email);
                    }
                    Err(err) => fail(format!("Failed to create user: {}", err)),
                }
            }

            UserCommands::List { limit, offset } => {
                match user_service.list_users(Some(limit), Some(offset)).await {
                    Ok(users) if users.is_empty() => println!("No users found."),
                    Ok(users) => {
                        println!(
                            "{:<5} {:<24} {:<40} {:<20}",
                            "ID", "Name", "Email", "Created"
                        );
                        println!("{}", "-".repeat(89));
                        for user in users {
                            println!(
                                "{:<5} {:<24} {:<40} {:<20}",
                                user.id,
                                user.name,
                                user.email,
                                user.created_at.as_deref().unwrap_or("N/A")
                            );
                        }
                    }
                    Err(err) => fail(format!("Failed to list users: {}", err)),
                }
            }

            UserCommands::ResetPassword { email, password } => {
                let user = match user_service.find_user_by_email(&email).await {
                    Ok(Some(user)) => user,
                    Ok(None) => fail(format!("User '{}' not found", email)),
                    Err(err) => fail(format!("Failed to find user: {}", err)),
                };

                let (new_password, password_confirm) = match password {
                    Some(pw) => (pw.clone(), pw),
                    None => confirm_password("New password")?,
                };

                let request = UpdatePasswordRequest {
                    user_id: user.id,
                    new_password,
                    new_password_confirm: Some(password_confirm),
                };

                match user_service.update_password(request).await {
                    Ok(()) => println!("✅ Password updated successfully for '{}'!", email),
                    Err(err) => fail(format!("Failed to update password: {}", err)),
                }
            }

            UserCommands::IssueReset { email } => {
                let reset_service = PasswordResetService::new(
                    user_repository,
                    create_email_service(&config.base_url),
                    config.reset_token_ttl,
                );

                match reset_service.request_reset(&email).await {
                    Ok(token) => {
                        println!("✅ Reset link for '{}':", email);
                        println!("  {}", reset_link(&config.base_url, &token));
                    }
                    Err(err) => fail(format!("Failed to issue reset: {}", err)),
                }
            }
        },
    }

    Ok(())
}
