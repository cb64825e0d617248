use std::fs;

use sbp::{CloseMode, Context, Message};
use tracing::info;

use crate::cmd::SendArgs;
use crate::exit::{
    frame_error, io_error, sbp_error, transport_error, CliError, CliResult, SUCCESS, USAGE,
};

pub fn run(args: SendArgs) -> CliResult<i32> {
    let message = resolve_message(&args)?;

    let ctx = Context::initialize();
    let connection = ctx
        .dial(&args.address)
        .map_err(|err| sbp_error("connect failed", err))?;
    let mut writer = ctx
        .writer(connection)
        .map_err(|err| sbp_error("connect failed", err))?;

    writer
        .send_message(&message)
        .map_err(|err| frame_error("send failed", err))?;
    info!(kind = %message.kind(), length = message.byte_len(), "sent message");

    let connection = writer.into_inner();
    connection
        .shutdown(CloseMode::Write)
        .map_err(|err| transport_error("close failed", err))?;
    connection
        .close()
        .map_err(|err| transport_error("close failed", err))?;

    Ok(SUCCESS)
}

fn resolve_message(args: &SendArgs) -> CliResult<Message> {
    if let Some(text) = &args.text {
        return Ok(Message::text(text.as_str()));
    }
    if let Some(ints) = &args.ints {
        return Ok(Message::from(ints.clone()));
    }
    if let Some(doubles) = &args.doubles {
        return Ok(Message::from(doubles.clone()));
    }
    if let Some(path) = &args.file {
        let data = fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
        return Ok(Message::Raw(data.into()));
    }
    Err(CliError::new(USAGE, "no payload given"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> SendArgs {
        SendArgs {
            address: "localhost 5000".into(),
            text: None,
            ints: None,
            doubles: None,
            file: None,
        }
    }

    #[test]
    fn payload_flags_pick_the_message_kind() {
        let text = SendArgs {
            text: Some("hello".into()),
            ..args()
        };
        assert_eq!(resolve_message(&text).unwrap(), Message::text("hello"));

        let ints = SendArgs {
            ints: Some(vec![1, -2]),
            ..args()
        };
        assert_eq!(
            resolve_message(&ints).unwrap(),
            Message::Int32Array(vec![1, -2])
        );

        let doubles = SendArgs {
            doubles: Some(vec![0.5]),
            ..args()
        };
        assert_eq!(
            resolve_message(&doubles).unwrap(),
            Message::Float64Array(vec![0.5])
        );
    }

    #[test]
    fn missing_file_is_reported() {
        let file = SendArgs {
            file: Some("/nonexistent/sbp-payload".into()),
            ..args()
        };
        let err = resolve_message(&file).unwrap_err();
        assert!(err.message.contains("failed reading"));
    }

    #[test]
    fn no_payload_is_a_usage_error() {
        assert_eq!(resolve_message(&args()).unwrap_err().code, USAGE);
    }
}
