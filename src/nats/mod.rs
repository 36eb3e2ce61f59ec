pub mod server;

pub use server::ChannelServer;
