mod dns;

use std::process::exit;
use std::str::FromStr;
use std::thread::spawn;

use getopts::Options;
use rand::random;

use crate::dns::client::{hex_dump, UdpClient};
use crate::dns::config::Config;
use crate::dns::context::ServerContext;
use crate::dns::log::EventLog;
use crate::dns::protocol::QueryType;
use crate::dns::resolve::Role;
use crate::dns::server::{DnsServer, UdpServer};

fn print_usage(program: &str, opts: &Options) {
    let brief = format!(
        "usage:\n  {0} [options]                     serve\n  {0} [options] resolve DOMAIN [TYPE]  query a server",
        program
    );
    print!("{}", opts.usage(&brief));
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    opts.optopt(
        "r",
        "role",
        "serve only one role: root, tld, authoritative, authorization",
        "ROLE",
    );
    opts.optopt("c", "config", "load topology from a JSON file", "FILE");
    opts.optopt("l", "log", "append events to a log file", "FILE");
    opts.optopt(
        "s",
        "server",
        "server address for resolve mode (default 127.0.0.1:5300)",
        "ADDR",
    );
    opts.optflag("h", "help", "print this help");

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(err) => {
            eprintln!("{}", err);
            exit(1);
        }
    };

    if matches.opt_present("h") {
        print_usage(&program, &opts);
        return;
    }

    if matches.free.first().map(|s| s.as_str()) == Some("resolve") {
        run_client(&matches);
    } else if !matches.free.is_empty() {
        eprintln!("unexpected argument: {}", matches.free[0]);
        exit(1);
    } else {
        run_servers(&matches);
    }
}

fn run_client(matches: &getopts::Matches) {
    let domain = match matches.free.get(1) {
        Some(domain) => domain.to_lowercase(),
        None => {
            eprintln!("resolve requires a domain");
            exit(1);
        }
    };

    let qtype = match matches.free.get(2) {
        Some(name) => match QueryType::from_str(name) {
            Ok(qtype) => qtype,
            Err(err) => {
                eprintln!("{}", err);
                exit(1);
            }
        },
        None => QueryType::A,
    };

    let server = matches
        .opt_str("s")
        .unwrap_or_else(|| "127.0.0.1:5300".to_string());
    let server = match server.parse() {
        Ok(addr) => addr,
        Err(_) => {
            eprintln!("invalid server address: {}", server);
            exit(1);
        }
    };

    let client = UdpClient::new();
    let (raw, packet) = match client.exchange_raw(&domain, qtype, server, random::<u16>()) {
        Ok(reply) => reply,
        Err(err) => {
            eprintln!("query failed: {}", err);
            exit(1);
        }
    };

    println!("reply ({} bytes): {}", raw.len(), hex_dump(&raw));

    if packet.header.rescode == 3 {
        println!("{}: NXDOMAIN", domain);
        return;
    }

    if packet.answers.is_empty() {
        println!("{}: no {} records", domain, qtype);
        return;
    }

    for record in &packet.answers {
        println!("{}\t{}", domain, record);
    }
}

fn run_servers(matches: &getopts::Matches) {
    let config = match matches.opt_str("c") {
        Some(path) => match Config::from_file(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("failed to load {}: {}", path, err);
                exit(1);
            }
        },
        None => Config::default_local(),
    };

    let roles = match matches.opt_str("r") {
        Some(name) => match Role::from_str(&name) {
            Ok(role) => vec![role],
            Err(err) => {
                eprintln!("{}", err);
                exit(1);
            }
        },
        None => vec![
            Role::Root,
            Role::Tld,
            Role::Authoritative,
            Role::Authorization,
        ],
    };

    let log_path = matches.opt_str("l");

    let mut handles = Vec::new();
    for role in roles {
        let role_config = config.role(role);

        let zones = match role_config.zones.build() {
            Ok(zones) => zones,
            Err(err) => {
                eprintln!("{}: bad zone data: {}", role, err);
                exit(1);
            }
        };

        let log = match &log_path {
            Some(path) => match EventLog::to_file(path) {
                Ok(log) => log,
                Err(err) => {
                    eprintln!("cannot open log file {}: {}", path, err);
                    exit(1);
                }
            },
            None => EventLog::stdout(),
        };

        let context = ServerContext::new(role, role_config.listen, zones, log);
        let mut server = match UdpServer::new(context) {
            Ok(server) => server,
            Err(err) => {
                eprintln!("{}: cannot bind {}: {}", role, role_config.listen, err);
                exit(1);
            }
        };

        println!("{} listening on {}", role, role_config.listen);

        handles.push(spawn(move || server.run()));
    }

    for handle in handles {
        let _ = handle.join();
    }
}
