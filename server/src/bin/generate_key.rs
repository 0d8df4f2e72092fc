use base64::Engine as _;
use color_eyre::eyre::Result;
use rand::RngCore as _;

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Generate a fresh 64-byte cookie sealing key
    let mut key = [0u8; 64];
    rand::rngs::OsRng.fill_bytes(&mut key);

    let encoded = base64::engine::general_purpose::STANDARD.encode(key);

    println!("Generated cookie sealing key:");
    println!("{}", encoded);
    println!();
    println!("You can use this key as your COOKIE_KEY environment variable.");
    println!("For example, add the following to your .env file:");
    println!("COOKIE_KEY=\"{}\"", encoded);

    Ok(())
}
