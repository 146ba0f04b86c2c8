//! Basic example of the Tarkib resolver.

use std::sync::Arc;

use tarkib::prelude::*;
use tarkib::{implements, injectable};

// === Define your traits and types ===

trait Logger: Send + Sync {
    fn log(&self, msg: &str);
}

struct ConsoleLogger;

#[injectable]
impl ConsoleLogger {
    pub fn new() -> Self {
        ConsoleLogger
    }
}

impl Logger for ConsoleLogger {
    fn log(&self, msg: &str) {
        println!("[LOG] {msg}");
    }
}

implements!(ConsoleLogger => dyn Logger);

struct Config {
    database_url: String,
    debug: bool,
}

struct Database {
    url: String,
    logger: Arc<dyn Logger>,
}

#[injectable]
impl Database {
    pub fn new(config: Arc<Config>, logger: Arc<dyn Logger>) -> Self {
        Self {
            url: config.database_url.clone(),
            logger,
        }
    }

    fn query(&self, sql: &str) -> String {
        self.logger.log(&format!("Executing: {sql}"));
        format!("Results from {}", self.url)
    }
}

struct UserRepository {
    db: Arc<Database>,
}

#[injectable]
impl UserRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn find_user(&self, id: u64) -> String {
        self.db.query(&format!("SELECT * FROM users WHERE id = {id}"))
    }
}

struct UserService {
    repo: Arc<UserRepository>,
    logger: Arc<dyn Logger>,
    page_size: usize,
}

#[injectable]
impl UserService {
    pub fn new(repo: Arc<UserRepository>, logger: Arc<dyn Logger>) -> Self {
        Self::with_page_size(repo, logger, 20)
    }

    pub fn with_page_size(repo: Arc<UserRepository>, logger: Arc<dyn Logger>, page_size: usize) -> Self {
        Self { repo, logger, page_size }
    }

    fn get_user(&self, id: u64) -> String {
        self.logger.log(&format!("Getting user {id} (page size {})", self.page_size));
        self.repo.find_user(id)
    }
}

fn main() -> Result<()> {
    // Initialize tracing (logging)
    tracing_subscriber::fmt()
        .with_env_filter("tarkib=debug")
        .init();

    let resolver = TypeResolver::builder()
        .strategy(StrategyKind::Compiled)
        .build();

    // Config: a pre-built instance
    let config = Arc::new(Config {
        database_url: "postgres://localhost/myapp".to_string(),
        debug: true,
    });
    resolver.register_instance(Arc::clone(&config));

    // Logger: abstraction mapped to a concrete type
    resolver.register_type::<dyn Logger, ConsoleLogger>()?;

    // Database and UserRepository: concrete types mapped to themselves
    resolver.register_type::<Database, Database>()?;
    resolver.register_type::<UserRepository, UserRepository>()?;

    println!("✅ Resolver ready");
    println!("{resolver:?}");
    println!("📋 Config: database_url={}, debug={}", config.database_url, config.debug);

    // UserService is never registered: it maps to itself on first use,
    // and page_size has no mapping so the two-argument constructor wins
    let service: Arc<UserService> = resolver.resolve()?;
    println!("👤 {}", service.get_user(42));

    // Supplying page_size by name makes the richer constructor usable
    let service: Arc<UserService> =
        resolver.resolve_with(&[ConstructorParameter::owned("page_size", 100usize)])?;
    println!("👤 {}", service.get_user(7));

    // Every registration usable as a Logger
    let loggers: Vec<Arc<dyn Logger>> = resolver.resolve_all()?;
    println!("🪵 {} logger(s) registered", loggers.len());

    println!("\n🎉 Everything works!");
    Ok(())
}
