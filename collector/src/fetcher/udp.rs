use super::{
    Varbind,
    WalkTarget,
    WalkTransport,
    WireValue,
};
use crate::{
    FetchError,
    SessionError,
};
use snmp::{
    ObjIdBuf,
    SyncSession,
};
use std::{
    future::Future,
    pin::Pin,
};

const DEFAULT_MAX_REPETITIONS: u32 = 20;

/// SNMPv2c walks over UDP using GETBULK.
///
/// The session is blocking, so every walk runs on tokio's blocking pool. Abandoning the future
/// does not stop a walk in flight: it runs until its own per-request timeout and is discarded.
#[derive(Debug, Clone)]
pub struct UdpWalker {
    max_repetitions: u32,
}

impl Default for UdpWalker {
    fn default() -> Self {
        Self {
            max_repetitions: DEFAULT_MAX_REPETITIONS,
        }
    }
}

impl UdpWalker {
    pub fn with_max_repetitions(max_repetitions: u32) -> Self {
        Self {
            max_repetitions: max_repetitions.max(1),
        }
    }
}

impl WalkTransport for UdpWalker {
    fn walk<'a>(
        &'a self,
        target: &'a WalkTarget,
        root: &'a [u32],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Varbind>, FetchError>> + Send + 'a>> {
        let target = target.clone();
        let root = root.to_vec();
        let max_repetitions = self.max_repetitions;
        Box::pin(async move {
            tokio::task::spawn_blocking(move || walk_blocking(&target, &root, max_repetitions))
                .await
                .map_err(|err| FetchError::Transport(format!("walk task failed: {err}")))?
        })
    }
}

fn walk_blocking(target: &WalkTarget, root: &[u32], max_repetitions: u32) -> Result<Vec<Varbind>, FetchError> {
    let unreachable = |reason: String| SessionError::Unreachable {
        device: target.device.clone(),
        reason,
    };

    let mut session = SyncSession::new(
        target.address.as_str(),
        target.community.as_bytes(),
        Some(target.timeout),
        0,
    )
    .map_err(|err| unreachable(err.to_string()))?;

    let mut varbinds = Vec::new();
    let mut cursor = root.to_vec();
    let mut name_buf: ObjIdBuf = [0; 128];
    let mut first_request = true;

    loop {
        let pdu = match session.getbulk(&[cursor.as_slice()], 0, max_repetitions) {
            Ok(pdu) => pdu,
            // Nothing ever came back: treat it as the device being unreachable.
            Err(err) if first_request => return Err(unreachable(format!("{err:?}")).into()),
            Err(err) => return Err(FetchError::Transport(format!("{err:?}"))),
        };
        first_request = false;

        if pdu.error_status != 0 {
            return Err(FetchError::Transport(format!(
                "agent answered with error status {} (index {})",
                pdu.error_status, pdu.error_index
            )));
        }

        // The varbind iterator ends early on exception values (endOfMibView and friends), so an
        // exhausted view shows up as a page that does not advance.
        let mut advanced = false;
        for (name, value) in pdu.varbinds {
            let oid = name
                .read_name(&mut name_buf)
                .map_err(|err| FetchError::Malformed(format!("{err:?}")))?;
            if !oid.starts_with(root) {
                return Ok(varbinds);
            }
            if oid <= cursor.as_slice() {
                return Err(FetchError::Transport("agent returned OIDs out of order".to_string()));
            }

            cursor = oid.to_vec();
            varbinds.push(Varbind {
                oid: cursor.clone(),
                value: wire_value(value),
            });
            advanced = true;
        }

        if !advanced {
            return Ok(varbinds);
        }
    }
}

fn wire_value(value: snmp::Value<'_>) -> WireValue {
    match value {
        snmp::Value::OctetString(bytes) => WireValue::OctetString(bytes.to_vec()),
        snmp::Value::Integer(n) => WireValue::Integer(n),
        snmp::Value::Counter32(n) => WireValue::Counter32(n),
        snmp::Value::Unsigned32(n) => WireValue::Gauge32(n),
        snmp::Value::Counter64(n) => WireValue::Counter64(n),
        other => WireValue::Other(format!("{other:?}")),
    }
}
