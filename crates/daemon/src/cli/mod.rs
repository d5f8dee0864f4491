pub mod args;
pub mod op;
pub mod ops;

pub use ops::{
    Chat, Daemon, Events, Export, Friend, Health, Import, Init, Keygen, Peers, Preference,
    Profile, Subscribe, Version,
};
