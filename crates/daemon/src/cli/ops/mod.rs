pub mod chat;
pub mod daemon;
pub mod events;
pub mod export;
pub mod friend;
pub mod health;
pub mod import;
pub mod init;
pub mod keygen;
pub mod peers;
pub mod preference;
pub mod profile;
pub mod subscribe;
pub mod version;

pub use chat::Chat;
pub use daemon::Daemon;
pub use events::Events;
pub use export::Export;
pub use friend::Friend;
pub use health::Health;
pub use import::Import;
pub use init::Init;
pub use keygen::Keygen;
pub use peers::Peers;
pub use preference::Preference;
pub use profile::Profile;
pub use subscribe::Subscribe;
pub use version::Version;
