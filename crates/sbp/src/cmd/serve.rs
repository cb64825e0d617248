use std::sync::Arc;
use std::thread;

use sbp::{Accepted, Config, Connection, Context, Error, ListenerId, MessageReader, TransportError};
use tracing::{debug, info, warn};

use crate::cmd::ServeArgs;
use crate::exit::{io_error, sbp_error, CliError, CliResult, INTERNAL, SUCCESS, VERIFY_FAILED};
use crate::output::{print_listening, print_message, print_report, OutputFormat};
use crate::sequence;

const CONNECTION_STACK_SIZE: usize = 1024 * 1024;

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let mut config = Config::default();
    config.transport.numeric_peer_names = args.numeric;
    if let Some(limit) = args.stall_limit {
        config.transfer.stall_retry_limit = limit;
    }

    let ctx = Arc::new(Context::with_config(config));
    let id = ctx
        .listen(&args.service)
        .map_err(|err| sbp_error("listen failed", err))?;
    let addrs = ctx
        .local_addrs(id)
        .map_err(|err| sbp_error("listen failed", err))?;

    let port = addrs.first().map(|addr| addr.port()).unwrap_or_default();
    let address = match sbp::hostname() {
        Ok(host) => format!("{host} {port}"),
        Err(err) => {
            warn!(error = %err, "could not get hostname");
            port.to_string()
        }
    };
    print_listening(&address, addrs.len(), format);

    install_ctrlc_handler(Arc::clone(&ctx), id)?;

    let mut workers: Vec<thread::JoinHandle<bool>> = Vec::new();
    let mut served = 0usize;
    let mut all_passed = true;

    while args.count.map_or(true, |count| served < count) {
        let accepted = match ctx.accept(id) {
            Ok(accepted) => accepted,
            Err(Error::Transport(
                TransportError::ListenerClosed(_) | TransportError::UnknownListener(_),
            )) => {
                info!("listener closed");
                break;
            }
            Err(err) => {
                warn!(error = %err, "accept failed");
                continue;
            }
        };
        served += 1;

        let peer = peer_label(&accepted);
        info!(%peer, member = accepted.member, "accepted connection");
        let reader = match ctx.reader(accepted.connection) {
            Ok(reader) => reader,
            Err(err) => {
                warn!(%peer, error = %err, "could not configure connection");
                continue;
            }
        };

        let worker = thread::Builder::new()
            .name(format!("conn-{served}"))
            .stack_size(CONNECTION_STACK_SIZE)
            .spawn(move || handle_connection(reader, &peer, format))
            .map_err(|err| io_error("spawning connection thread failed", err))?;
        all_passed &= reap_finished(&mut workers);
        workers.push(worker);
    }

    // Without a count the loop only ends on Ctrl-C; do not wait for clients then.
    if args.count.is_none() {
        return Ok(SUCCESS);
    }

    for worker in workers {
        all_passed &= worker.join().unwrap_or(false);
    }
    Ok(if all_passed { SUCCESS } else { VERIFY_FAILED })
}

/// Print every message until the peer goes away. False if anything failed.
fn handle_connection(mut reader: MessageReader<Connection>, peer: &str, format: OutputFormat) -> bool {
    let mut ok = true;
    loop {
        let message = match reader.read_message() {
            Ok(message) => message,
            Err(err) if err.is_clean_close() => {
                info!(peer, "connection closed by peer");
                break;
            }
            Err(err) => {
                warn!(peer, error = %err, "receive failed; dropping connection");
                ok = false;
                break;
            }
        };
        print_message(&message, peer, format);

        if message.as_text().as_deref() == Some(sequence::TRIGGER) {
            match sequence::verify(&mut reader) {
                Ok(report) => {
                    ok &= report.passed();
                    print_report(&report, peer, format);
                }
                Err(err) => {
                    warn!(peer, error = %err, "doTests sequence incomplete");
                    ok = false;
                    break;
                }
            }
        }
    }

    if let Err(err) = reader.into_inner().close() {
        debug!(peer, error = %err, "close failed");
    }
    ok
}

/// Join handlers that already returned; false if any of them failed.
fn reap_finished(workers: &mut Vec<thread::JoinHandle<bool>>) -> bool {
    let (finished, running): (Vec<_>, Vec<_>) =
        workers.drain(..).partition(|worker| worker.is_finished());
    *workers = running;
    finished
        .into_iter()
        .fold(true, |ok, worker| worker.join().unwrap_or(false) && ok)
}

fn peer_label(accepted: &Accepted) -> String {
    if accepted.peer_text.is_empty() {
        accepted.peer_addr.to_string()
    } else {
        accepted.peer_text.clone()
    }
}

fn install_ctrlc_handler(ctx: Arc<Context>, id: ListenerId) -> CliResult<()> {
    ctrlc::set_handler(move || {
        if let Err(err) = ctx.close_listener(id) {
            warn!(error = %err, "closing listener failed");
        }
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
