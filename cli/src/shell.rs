//! The interactive REPL, grounded on `original_source/cmd/cmd.go` and
//! `cmd/cmd_service.go`'s command dispatch.

use std::io::Write;
use std::sync::Arc;

use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};

use chordring_core::ChordNode;

pub async fn run(node: Arc<ChordNode>, aes_key: Option<[u8; 32]>) -> anyhow::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    print_prompt();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            print_prompt();
            continue;
        }

        let mut parts = line.splitn(2, char::is_whitespace);
        let command = parts.next().unwrap_or("");
        let arg = parts.next().unwrap_or("").trim();

        match command {
            "printstate" => cmd_printstate(&node),
            "lookup" => cmd_lookup(&node, arg).await,
            "storefile" => cmd_storefile(&node, arg, aes_key.as_ref()).await,
            "storefiles" => cmd_storefiles(&node, arg, aes_key.as_ref()).await,
            "getfile" => cmd_getfile(&node, arg, aes_key.as_ref()).await,
            "clear" => {
                print!("\x1B[2J\x1B[1;1H");
            }
            "quit" | "exit" => {
                println!("{}", "Leaving the ring...".yellow());
                node.quit().await;
                break;
            }
            other => println!("{} unknown command: {}", "error:".red(), other),
        }

        print_prompt();
    }

    Ok(())
}

fn print_prompt() {
    print!("{} ", "chord>".bright_green());
    let _ = std::io::stdout().flush();
}

fn cmd_printstate(node: &ChordNode) {
    println!("{}", "Node".bold());
    println!("  id:   {}", node.info.id);
    println!("  addr: {}", node.info.addr());

    println!("{}", "Predecessor".bold());
    match node.predecessor() {
        Some(p) => println!("  {p}"),
        None => println!("  (none)"),
    }

    println!("{}", "Successors".bold());
    for (i, s) in node.successors().iter().enumerate() {
        println!("  [{i}] {s}");
    }

    println!("{}", "Fingers".bold());
    for (i, f) in node.fingers().iter().enumerate() {
        println!("  [{i}] {f}");
    }
}

async fn cmd_lookup(node: &ChordNode, name: &str) {
    if name.is_empty() {
        println!("{} usage: lookup <name>", "error:".red());
        return;
    }
    let id = node.local_identifier(name);
    match node.find_successor(id).await {
        Ok(owner) => println!("{} -> id {} -> {}", name.bright_cyan(), id, owner),
        Err(e) => println!("{} lookup failed: {e}", "error:".red()),
    }
}

async fn cmd_storefile(node: &ChordNode, path: &str, aes_key: Option<&[u8; 32]>) {
    if path.is_empty() {
        println!("{} usage: storefile <path>", "error:".red());
        return;
    }
    let name = match std::path::Path::new(path).file_name().and_then(|n| n.to_str()) {
        Some(n) => n.to_string(),
        None => {
            println!("{} invalid path: {path}", "error:".red());
            return;
        }
    };

    let data = match std::fs::read(path) {
        Ok(d) => d,
        Err(e) => {
            println!("{} failed to read {path}: {e}", "error:".red());
            return;
        }
    };

    let payload = match aes_key {
        Some(key) => match chordring_core::crypto::encrypt(key, &data) {
            Ok(blob) => blob,
            Err(e) => {
                println!("{} encryption failed: {e}", "error:".red());
                return;
            }
        },
        None => data,
    };

    let id = node.local_identifier(&name);
    match node.find_successor(id).await {
        Ok(owner) => match node.call_peer_store(&owner, &name, payload).await {
            Ok(()) => println!("stored {} (id {}) on {}", name.bright_cyan(), id, owner),
            Err(e) => println!("{} store failed: {e}", "error:".red()),
        },
        Err(e) => println!("{} lookup failed: {e}", "error:".red()),
    }
}

async fn cmd_storefiles(node: &ChordNode, dir: &str, aes_key: Option<&[u8; 32]>) {
    if dir.is_empty() {
        println!("{} usage: storefiles <dir>", "error:".red());
        return;
    }
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            println!("{} failed to read {dir}: {e}", "error:".red());
            return;
        }
    };
    for entry in entries.flatten() {
        if entry.path().is_file() {
            if let Some(path) = entry.path().to_str() {
                cmd_storefile(node, path, aes_key).await;
            }
        }
    }
}

async fn cmd_getfile(node: &ChordNode, name: &str, aes_key: Option<&[u8; 32]>) {
    if name.is_empty() {
        println!("{} usage: getfile <name>", "error:".red());
        return;
    }
    let id = node.local_identifier(name);
    let owner = match node.find_successor(id).await {
        Ok(owner) => owner,
        Err(e) => {
            println!("{} lookup failed: {e}", "error:".red());
            return;
        }
    };

    let data = match node.call_peer_get(&owner, name).await {
        Ok(data) => data,
        Err(e) => {
            println!("{} getfile failed: {e}", "error:".red());
            return;
        }
    };

    let plaintext = match aes_key {
        Some(key) => match chordring_core::crypto::decrypt(key, &data) {
            Ok(p) => p,
            Err(e) => {
                println!("{} decryption failed: {e}", "error:".red());
                return;
            }
        },
        None => data,
    };

    match std::fs::write(name, &plaintext) {
        Ok(()) => println!("retrieved {} (id {}) from {}", name.bright_cyan(), id, owner),
        Err(e) => println!("{} failed to write {name}: {e}", "error:".red()),
    }
}
