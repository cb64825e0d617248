use std::thread;

use sbp::{CloseMode, Config, Context};
use tracing::info;

use crate::cmd::{parse_duration, ClientArgs};
use crate::exit::{frame_error, sbp_error, transport_error, CliResult, SUCCESS};
use crate::sequence;

pub fn run(args: ClientArgs) -> CliResult<i32> {
    let linger = args.linger.as_deref().map(parse_duration).transpose()?;
    let mut config = Config::default();
    if let Some(timeout) = args.connect_timeout.as_deref() {
        config.transport.connect_timeout = Some(parse_duration(timeout)?);
    }

    let ctx = Context::with_config(config);
    let connection = ctx
        .dial(&args.address)
        .map_err(|err| sbp_error("connect failed", err))?;
    let mut writer = ctx
        .writer(connection)
        .map_err(|err| sbp_error("connect failed", err))?;

    sequence::send(&mut writer).map_err(|err| frame_error("send failed", err))?;

    let connection = writer.into_inner();
    connection
        .shutdown(CloseMode::Write)
        .map_err(|err| transport_error("close failed", err))?;
    println!("sent {} sequence to {}", sequence::TRIGGER, args.address);

    if let Some(linger) = linger {
        info!(?linger, "holding connection open");
        thread::sleep(linger);
    }
    connection
        .close()
        .map_err(|err| transport_error("close failed", err))?;

    Ok(SUCCESS)
}
