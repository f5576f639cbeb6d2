//! CLI configuration, grounded on `local_backend::config::LocalConfig`'s
//! `clap::Parser` shape.

use std::net::Ipv4Addr;

use clap::Parser;

#[derive(Parser, Clone, Debug)]
#[clap(author = "Convex, Inc. <no-reply@convex.dev>")]
pub struct Config {
    /// Host interface to bind to
    #[clap(short, long, default_value = "0.0.0.0")]
    pub interface: Ipv4Addr,

    /// Host port to bind to
    #[clap(short, long, default_value = "8002")]
    pub port: u16,

    /// Directory backing the local `tantivy` index used by the
    /// `tantivy_backed` search adapter
    #[clap(long, default_value = "bulk_consume_index")]
    pub index_dir: String,
}

impl Config {
    pub fn bind_address(&self) -> (Ipv4Addr, u16) {
        (self.interface, self.port)
    }
}
