//! Query signal quality and watch unsolicited network reports.
//!
//! Usage: signal_monitor <command-tty> <unsolicited-tty>

use std::sync::Arc;
use std::time::Duration;

use atmux::transport::SerialTransport;
use atmux::{
    AtTokenizer, ChannelConfig, ChannelId, ChannelRole, CommandDescriptor, Mux, Payload,
    RadioState, RequestId, ResponseKind, Route, Service, ServiceKind, StatePolicy,
};

const GET_SIGNAL: RequestId = RequestId::new(1);

const CMD: ChannelId = ChannelId::from_index(0);
const UNSOL: ChannelId = ChannelId::from_index(1);

struct NetworkService;

impl Service for NetworkService {
    fn prepare(&self, request: RequestId, _payload: &Payload) -> atmux::Result<CommandDescriptor> {
        match request {
            GET_SIGNAL => {
                Ok(CommandDescriptor::new("AT+CSQ", ResponseKind::SingleLine).prefix("+CSQ:"))
            }
            other => Err(atmux::Error::Unsupported(other)),
        }
    }

    fn on_unsolicited(&self, line: &str, _pdu: Option<&str>) {
        println!("report: {line}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let cmd_tty = args.next().unwrap_or_else(|| "/dev/cmux1".into());
    let unsol_tty = args.next().unwrap_or_else(|| "/dev/cmux2".into());

    let cmd_port = SerialTransport::open(&cmd_tty, 115_200).await?;
    let unsol_port = SerialTransport::open(&unsol_tty, 115_200).await?;

    let mux = Mux::builder()
        .channel(ChannelConfig::new(CMD, ChannelRole::Command), Box::new(cmd_port))
        .channel(
            ChannelConfig::new(UNSOL, ChannelRole::Unsolicited),
            Box::new(unsol_port),
        )
        .service(ServiceKind::Network, Arc::new(NetworkService))
        .route(
            GET_SIGNAL,
            Route::new(ServiceKind::Network, CMD, StatePolicy::AnyState),
        )
        .query_timeout(Duration::from_secs(5))
        .build();

    // the modem answers AT+CSQ even before the radio is on
    mux.radio().set_state(RadioState::On);

    let response = mux.query(GET_SIGNAL, Payload::Null).await?;
    if let Some(line) = response.intermediates.first() {
        let mut tok = AtTokenizer::new(line)?;
        let rssi = tok.next_int()?;
        let ber = tok.next_int()?;
        println!("rssi={rssi} ber={ber}");
    }

    let mut events = mux.subscribe();
    while let Ok(event) = events.recv().await {
        println!("link: {event:?}");
    }
    Ok(())
}
