//! # signer CLI
//!
//! Command-line interface for the hash-signing pipeline.
//!
//! ## Usage
//! ```bash
//! signer sign
//! signer sign 0 1 1 2 3 5 8 --salt pepper --output json
//! ```

mod cli;

use hash_signer::Result;

fn main() -> Result<()> {
    hash_signer::init_tracing();
    cli::run()
}
