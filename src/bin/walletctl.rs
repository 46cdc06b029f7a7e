//! Command line front-end for key generation, hashing and address printing

use std::env;
use std::fs;
use std::io::{self, Write};
use std::process;

use satoshi_core::error::Result;
use satoshi_core::keys::{PrivateKey, PublicKey};
use satoshi_core::sha256::sha256;

fn usage() {
    eprintln!("usage: walletctl <command> [args]");
    eprintln!();
    eprintln!("commands:");
    eprintln!("  getnewaddress [os|user|mastering]   generate a key and print its address");
    eprintln!("  sha256 <path>                       print the hex digest of a file");
    eprintln!("  private_key [os|user]               print a new private key scalar");
    eprintln!("  public_key <hex_scalar>             print the public point for a scalar");
}

fn prompt_word(round: usize) -> String {
    print!("Enter some word #{}/5: ", round);
    io::stdout().flush().ok();
    let mut line = String::new();
    io::stdin().read_line(&mut line).unwrap_or(0);
    line.trim_end().to_string()
}

fn generate_key(source: &str) -> Result<PrivateKey> {
    match source {
        "os" => Ok(PrivateKey::generate()),
        "user" => Ok(PrivateKey::from_user_entropy(prompt_word)),
        "mastering" => Ok(PrivateKey::from_mastering_vector()),
        other => Err(satoshi_core::CoreError::Parse(format!(
            "unknown entropy source {:?}, expected os, user or mastering",
            other
        ))),
    }
}

fn print_point(pubkey: &PublicKey) {
    println!("x: {:064X}", pubkey.x());
    println!("y: {:064X}", pubkey.y());
}

fn cmd_getnewaddress(args: &[String]) -> Result<()> {
    let source = args.first().map(String::as_str).unwrap_or("os");
    let key = generate_key(source)?;
    println!("generated private key:");
    println!("0x{}", key.to_hex());
    let pubkey = key.public_key();
    println!("corresponding public key:");
    print_point(&pubkey);
    println!("compressed bitcoin address (b58check format):");
    println!("{}", pubkey.address(true, false));
    Ok(())
}

fn cmd_sha256(args: &[String]) -> Result<()> {
    let path = args.first().ok_or_else(|| {
        satoshi_core::CoreError::Parse("sha256 needs a file path".to_string())
    })?;
    let contents = fs::read(path)?;
    println!("{}", hex::encode(sha256(&contents)));
    Ok(())
}

fn cmd_private_key(args: &[String]) -> Result<()> {
    let source = args.first().map(String::as_str).unwrap_or("os");
    let key = generate_key(source)?;
    println!("0x{}", key.to_hex());
    Ok(())
}

fn cmd_public_key(args: &[String]) -> Result<()> {
    let scalar = args.first().ok_or_else(|| {
        satoshi_core::CoreError::Parse("public_key needs a hex scalar".to_string())
    })?;
    let key = PrivateKey::from_hex(scalar)?;
    print_point(&key.public_key());
    Ok(())
}

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().skip(1).collect();

    let result = match args.first().map(String::as_str) {
        Some("getnewaddress") => cmd_getnewaddress(&args[1..]),
        Some("sha256") => cmd_sha256(&args[1..]),
        Some("private_key") => cmd_private_key(&args[1..]),
        Some("public_key") => cmd_public_key(&args[1..]),
        _ => {
            usage();
            process::exit(2);
        }
    };

    if let Err(err) = result {
        eprintln!("error: {}", err);
        process::exit(1);
    }
}
