mod audio;
mod config;
mod error;
mod focus;
mod library;
mod mpris;
mod playlist;
mod runtime;
mod store;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    runtime::run()
}
