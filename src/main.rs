use clap::Parser;
use rmc::driver::{self, Options};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    driver::run(&Options::parse())
}
