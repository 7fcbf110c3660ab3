//! Binary entry point: CLI parsing, logging setup, privilege dropping,
//! daemonization, signal handling, and handing off to the event loop.
//! Grounded on `main()`: parse args, create the tunnel, drop privileges,
//! daemonize, install signal handlers, run forever.

use std::process::ExitCode;

use clap::Parser;
use eccvpn::config::Config;
use eccvpn::event_loop;
use eccvpn::time::SystemTimeProvider;
use eccvpn::Tunnel;
use signal_hook::consts::{SIGINT, SIGTERM, SIGUSR1};

fn main() -> ExitCode {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = run(&config) {
        tracing::error!(error = %e, "fatal error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(config: &Config) -> Result<(), eccvpn::TunnelError> {
    let time = SystemTimeProvider;
    let resync_requested = event_loop::install_resync_flag();

    let mut tunnel = Tunnel::create(config, &time, resync_requested.clone())?;

    drop_privileges(config)?;

    if !config.foreground {
        daemonize()?;
    }

    signal_hook::flag::register(SIGUSR1, resync_requested.clone())
        .map_err(eccvpn::TunnelError::Io)?;
    install_quit_handler(SIGINT)?;
    install_quit_handler(SIGTERM)?;

    tracing::info!("starting up");
    tunnel.run()
}

fn drop_privileges(config: &Config) -> Result<(), eccvpn::TunnelError> {
    use nix::unistd::{chdir, chroot, setgid, setuid, Group, User};

    if let Some(dir) = &config.chroot_dir {
        chdir(dir.as_str()).map_err(|e| eccvpn::TunnelError::Configuration(e.to_string()))?;
        chroot(dir.as_str()).map_err(|e| eccvpn::TunnelError::Configuration(e.to_string()))?;
    }
    // Group before user: once we've dropped to an unprivileged uid, setgid
    // would no longer be permitted.
    if let Some(group) = &config.run_as_group {
        let entry = Group::from_name(group)
            .map_err(|e| eccvpn::TunnelError::Configuration(e.to_string()))?
            .ok_or_else(|| eccvpn::TunnelError::Configuration(format!("unknown group: {group}")))?;
        setgid(entry.gid).map_err(|e| eccvpn::TunnelError::Configuration(e.to_string()))?;
    }
    if let Some(user) = &config.run_as_user {
        let entry = User::from_name(user)
            .map_err(|e| eccvpn::TunnelError::Configuration(e.to_string()))?
            .ok_or_else(|| eccvpn::TunnelError::Configuration(format!("unknown user: {user}")))?;
        setuid(entry.uid).map_err(|e| eccvpn::TunnelError::Configuration(e.to_string()))?;
    }
    Ok(())
}

fn daemonize() -> Result<(), eccvpn::TunnelError> {
    daemonize::Daemonize::new()
        .start()
        .map_err(|e| eccvpn::TunnelError::Configuration(e.to_string()))
}

fn install_quit_handler(signal: i32) -> Result<(), eccvpn::TunnelError> {
    unsafe {
        signal_hook::low_level::register(signal, || {
            tracing::info!("exiting due to signal");
            std::process::exit(0);
        })
        .map_err(eccvpn::TunnelError::Io)?;
    }
    Ok(())
}

