//! Frame classification: the trust boundary between raw frames and dispatch.
//!
//! [`classify`] is a pure, total, deterministic function from an inbound
//! frame to a [`ClassifyResult`]: the semantic shape of the frame (request,
//! response, event, config, protocol error, malformed), its decoded headers,
//! optional layer data, opaque payload, and a [`FrameDisposition`] telling
//! the transport what to do next. It never panics, never suspends, and
//! never copies payload bytes; `Bytes` slices share the frame's storage.
//!
//! The machine is a fold over per-transition functions. Every transition
//! re-checks that it runs in its own named state and that its predecessors
//! produced the outputs it needs; a violated guard degrades to
//! `Indeterminate` rather than corrupting a result. A transition counter
//! bounds the fold at the number of states, so even a bugged transition
//! table cannot loop.

use bytes::Bytes;

use super::frame::Frame;
use super::headers::{ConfigRecord, Headers, PayloadKind, ProtocolError, ProtocolErrorCode};
use super::wire_format::FrameletType;

/// Which feature set a connection speaks.
///
/// The stream transport speaks [`Full`](ProtocolVariant::Full); the
/// in-process loopback speaks [`Lean`](ProtocolVariant::Lean).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVariant {
    /// Request/response only: `Headers, PayloadData`, exactly two framelets.
    Lean,
    /// Adds optional layer data, event delivery, config frames and
    /// protocol-error frames.
    Full,
}

/// The classifier's output directive to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameDisposition {
    /// Classification failed internally; treat as a bug, log and close.
    #[default]
    Indeterminate,
    /// Hand the request payload to the local service.
    DeliverRequestToService,
    /// Complete the outstanding request matching `headers.request_id`.
    DeliverResponseToProxy,
    /// Hand the event payload to the local service; no response.
    DeliverEventToService,
    /// Apply the peer's configuration record.
    ProcessConfig,
    /// The peer reported a protocol error; surface it locally.
    HandleProtocolError,
    /// Reply with a protocol-error frame carrying `error_code`.
    SendProtocolError,
    /// Close the connection silently.
    HangUp,
}

/// Everything the classifier learned about one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifyResult {
    /// What the dispatcher should do.
    pub disposition: FrameDisposition,
    /// Decoded headers; present for every message disposition.
    pub headers: Option<Headers>,
    /// Layer-data contents, zero-copy, when the frame carried them.
    pub layer_data: Option<Bytes>,
    /// Payload contents, zero-copy.
    pub payload: Option<Bytes>,
    /// The peer's protocol-error record, on `HandleProtocolError`.
    pub error: Option<ProtocolError>,
    /// The code to send back, on `SendProtocolError` (and recorded on
    /// `HangUp` for diagnostics).
    pub error_code: Option<ProtocolErrorCode>,
}

/// States of the classification machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifyState {
    /// Start: the frame reference itself has not been inspected.
    ExpectFrame,
    /// The frame exists; its first framelet decides the shape.
    ExpectFirstFramelet,
    /// A `Headers` framelet must decode at index 0.
    ExpectHeaders,
    /// Peek index 1 for optional `LayerData` (full variant only).
    ExpectOptionalLayerData,
    /// A `PayloadData` framelet must sit at the computed index.
    ExpectPayload,
    /// No trailing framelets allowed.
    ExpectEndOfFrame,
    /// Headers decoded and shape valid; the payload kind decides.
    FrameComplete,
    /// Derive the disposition from the payload kind.
    ValidFrame,
    /// Validate the single `Config` framelet (full variant only).
    ExpectConfig,
    /// Validate the single `ProtocolError` framelet (full variant only).
    ExpectProtocolError,
    /// Terminal: return the accumulated result.
    ClassifiedValidFrame,
    /// Terminal: reply with a protocol error.
    MalformedFrame,
    /// Terminal: the peer's error frame was itself bad; hang up.
    ErrorInErrorFrame,
    /// Terminal: a guard was violated; return `Indeterminate`.
    InternalStateError,
}

/// Number of classifier states; also the transition budget for one frame.
pub const MAX_TRANSITIONS: usize = 14;

type Step = (ClassifyState, ClassifyResult);

fn malformed(mut out: ClassifyResult, code: ProtocolErrorCode) -> Step {
    out.error_code = Some(code);
    (ClassifyState::MalformedFrame, out)
}

fn internal(out: ClassifyResult) -> Step {
    (ClassifyState::InternalStateError, out)
}

fn expect_frame(
    state: ClassifyState,
    frame: Option<&Frame>,
    _variant: ProtocolVariant,
    out: ClassifyResult,
) -> Step {
    if state != ClassifyState::ExpectFrame {
        return internal(out);
    }
    match frame {
        Some(_) => (ClassifyState::ExpectFirstFramelet, out),
        None => internal(out),
    }
}

fn expect_first_framelet(
    state: ClassifyState,
    frame: Option<&Frame>,
    variant: ProtocolVariant,
    out: ClassifyResult,
) -> Step {
    if state != ClassifyState::ExpectFirstFramelet {
        return internal(out);
    }
    let Some(frame) = frame else {
        return internal(out);
    };
    let Some(first) = frame.framelet(0) else {
        return malformed(out, ProtocolErrorCode::MalformedData);
    };
    match (first.kind(), variant) {
        (Some(FrameletType::Headers), _) => (ClassifyState::ExpectHeaders, out),
        (Some(FrameletType::Config), ProtocolVariant::Full) => {
            (ClassifyState::ExpectConfig, out)
        }
        (Some(FrameletType::ProtocolError), ProtocolVariant::Full) => {
            (ClassifyState::ExpectProtocolError, out)
        }
        _ => malformed(out, ProtocolErrorCode::MalformedData),
    }
}

fn expect_headers(
    state: ClassifyState,
    frame: Option<&Frame>,
    variant: ProtocolVariant,
    mut out: ClassifyResult,
) -> Step {
    if state != ClassifyState::ExpectHeaders {
        return internal(out);
    }
    let Some(frame) = frame else {
        return internal(out);
    };
    let Some(first) = frame.framelet(0) else {
        return internal(out);
    };
    match Headers::decode(first.contents()) {
        Ok(headers) => {
            out.headers = Some(headers);
            match variant {
                ProtocolVariant::Full => (ClassifyState::ExpectOptionalLayerData, out),
                ProtocolVariant::Lean => (ClassifyState::ExpectPayload, out),
            }
        }
        Err(_) => malformed(out, ProtocolErrorCode::MalformedData),
    }
}

fn expect_optional_layer_data(
    state: ClassifyState,
    frame: Option<&Frame>,
    _variant: ProtocolVariant,
    mut out: ClassifyResult,
) -> Step {
    if state != ClassifyState::ExpectOptionalLayerData {
        return internal(out);
    }
    let Some(frame) = frame else {
        return internal(out);
    };
    if out.headers.is_none() {
        return internal(out);
    }
    let Some(second) = frame.framelet(1) else {
        return malformed(out, ProtocolErrorCode::MalformedData);
    };
    match second.kind() {
        Some(FrameletType::PayloadData) => (ClassifyState::ExpectPayload, out),
        Some(FrameletType::LayerData) => {
            out.layer_data = Some(second.contents_bytes());
            (ClassifyState::ExpectPayload, out)
        }
        _ => malformed(out, ProtocolErrorCode::MalformedData),
    }
}

fn expect_payload(
    state: ClassifyState,
    frame: Option<&Frame>,
    variant: ProtocolVariant,
    mut out: ClassifyResult,
) -> Step {
    if state != ClassifyState::ExpectPayload {
        return internal(out);
    }
    let Some(frame) = frame else {
        return internal(out);
    };
    if out.headers.is_none() {
        return internal(out);
    }
    let index = match variant {
        ProtocolVariant::Lean => 1,
        ProtocolVariant::Full => 1 + usize::from(out.layer_data.is_some()),
    };
    match frame.framelet(index) {
        Some(framelet) if framelet.kind() == Some(FrameletType::PayloadData) => {
            out.payload = Some(framelet.contents_bytes());
            (ClassifyState::ExpectEndOfFrame, out)
        }
        _ => malformed(out, ProtocolErrorCode::MalformedData),
    }
}

fn expect_end_of_frame(
    state: ClassifyState,
    frame: Option<&Frame>,
    variant: ProtocolVariant,
    out: ClassifyResult,
) -> Step {
    if state != ClassifyState::ExpectEndOfFrame {
        return internal(out);
    }
    let Some(frame) = frame else {
        return internal(out);
    };
    if out.headers.is_none() || out.payload.is_none() {
        return internal(out);
    }
    let expected = match variant {
        ProtocolVariant::Lean => 2,
        ProtocolVariant::Full => 2 + usize::from(out.layer_data.is_some()),
    };
    if frame.count() != expected {
        return malformed(out, ProtocolErrorCode::MalformedData);
    }
    (ClassifyState::FrameComplete, out)
}

fn frame_complete(
    state: ClassifyState,
    _frame: Option<&Frame>,
    variant: ProtocolVariant,
    out: ClassifyResult,
) -> Step {
    if state != ClassifyState::FrameComplete {
        return internal(out);
    }
    let Some(headers) = out.headers.as_ref() else {
        return internal(out);
    };
    match headers.kind() {
        Some(PayloadKind::Request) | Some(PayloadKind::Response) => {
            (ClassifyState::ValidFrame, out)
        }
        // Event delivery exists only on the full variant; the lean side
        // answers with a protocol error instead of dropping silently.
        Some(PayloadKind::Event) => match variant {
            ProtocolVariant::Full => (ClassifyState::ValidFrame, out),
            ProtocolVariant::Lean => malformed(out, ProtocolErrorCode::NotSupported),
        },
        None => malformed(out, ProtocolErrorCode::NotSupported),
    }
}

fn valid_frame(
    state: ClassifyState,
    _frame: Option<&Frame>,
    variant: ProtocolVariant,
    mut out: ClassifyResult,
) -> Step {
    if state != ClassifyState::ValidFrame {
        return internal(out);
    }
    let Some(headers) = out.headers.as_ref() else {
        return internal(out);
    };
    let disposition = match (headers.kind(), variant) {
        (Some(PayloadKind::Request), _) => FrameDisposition::DeliverRequestToService,
        (Some(PayloadKind::Response), _) => FrameDisposition::DeliverResponseToProxy,
        (Some(PayloadKind::Event), ProtocolVariant::Full) => {
            FrameDisposition::DeliverEventToService
        }
        // FrameComplete admits nothing else; reaching here is a bug.
        _ => return internal(out),
    };
    out.disposition = disposition;
    (ClassifyState::ClassifiedValidFrame, out)
}

fn expect_config(
    state: ClassifyState,
    frame: Option<&Frame>,
    _variant: ProtocolVariant,
    mut out: ClassifyResult,
) -> Step {
    if state != ClassifyState::ExpectConfig {
        return internal(out);
    }
    let Some(frame) = frame else {
        return internal(out);
    };
    if frame.count() != 1 {
        return malformed(out, ProtocolErrorCode::MalformedData);
    }
    let Some(first) = frame.framelet(0) else {
        return internal(out);
    };
    match ConfigRecord::decode(first.contents()) {
        Ok(_) => {
            out.disposition = FrameDisposition::ProcessConfig;
            (ClassifyState::ClassifiedValidFrame, out)
        }
        Err(_) => malformed(out, ProtocolErrorCode::MalformedData),
    }
}

fn expect_protocol_error(
    state: ClassifyState,
    frame: Option<&Frame>,
    _variant: ProtocolVariant,
    mut out: ClassifyResult,
) -> Step {
    if state != ClassifyState::ExpectProtocolError {
        return internal(out);
    }
    let Some(frame) = frame else {
        return internal(out);
    };
    if frame.count() != 1 {
        return (ClassifyState::ErrorInErrorFrame, out);
    }
    let Some(first) = frame.framelet(0) else {
        return internal(out);
    };
    match ProtocolError::decode(first.contents()) {
        Ok(record) => {
            out.error = Some(record);
            out.disposition = FrameDisposition::HandleProtocolError;
            (ClassifyState::ClassifiedValidFrame, out)
        }
        Err(_) => (ClassifyState::ErrorInErrorFrame, out),
    }
}

/// Classify one inbound frame.
///
/// Total over all inputs, including the empty frame and an absent frame.
/// Pure: same input, same output, no global state, no I/O, no suspension.
pub fn classify(frame: Option<&Frame>, variant: ProtocolVariant) -> ClassifyResult {
    let mut state = ClassifyState::ExpectFrame;
    let mut out = ClassifyResult::default();
    let mut transitions = 0usize;

    loop {
        // A bugged transition table must not spin; bail out once the fold
        // has taken more steps than there are states.
        transitions += 1;
        if transitions > MAX_TRANSITIONS {
            tracing::error!("frame classification exceeded {MAX_TRANSITIONS} transitions");
            return ClassifyResult::default();
        }

        let step = match state {
            ClassifyState::ExpectFrame => expect_frame(state, frame, variant, out),
            ClassifyState::ExpectFirstFramelet => {
                expect_first_framelet(state, frame, variant, out)
            }
            ClassifyState::ExpectHeaders => expect_headers(state, frame, variant, out),
            ClassifyState::ExpectOptionalLayerData => {
                expect_optional_layer_data(state, frame, variant, out)
            }
            ClassifyState::ExpectPayload => expect_payload(state, frame, variant, out),
            ClassifyState::ExpectEndOfFrame => expect_end_of_frame(state, frame, variant, out),
            ClassifyState::FrameComplete => frame_complete(state, frame, variant, out),
            ClassifyState::ValidFrame => valid_frame(state, frame, variant, out),
            ClassifyState::ExpectConfig => expect_config(state, frame, variant, out),
            ClassifyState::ExpectProtocolError => {
                expect_protocol_error(state, frame, variant, out)
            }
            ClassifyState::ClassifiedValidFrame
            | ClassifyState::MalformedFrame
            | ClassifyState::ErrorInErrorFrame
            | ClassifyState::InternalStateError => break,
        };
        state = step.0;
        out = step.1;
    }

    match state {
        ClassifyState::ClassifiedValidFrame => out,
        ClassifyState::MalformedFrame => ClassifyResult {
            disposition: FrameDisposition::SendProtocolError,
            error_code: out.error_code.or(Some(ProtocolErrorCode::MalformedData)),
            ..Default::default()
        },
        ClassifyState::ErrorInErrorFrame => ClassifyResult {
            disposition: FrameDisposition::HangUp,
            error_code: Some(ProtocolErrorCode::ErrorInError),
            ..Default::default()
        },
        // InternalStateError, or any non-terminal state (unreachable).
        _ => ClassifyResult::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::{
        build_config_frame, build_frame, build_protocol_error_frame, Framelet,
    };
    use proptest::prelude::*;

    const ALL_STATES: [ClassifyState; MAX_TRANSITIONS] = [
        ClassifyState::ExpectFrame,
        ClassifyState::ExpectFirstFramelet,
        ClassifyState::ExpectHeaders,
        ClassifyState::ExpectOptionalLayerData,
        ClassifyState::ExpectPayload,
        ClassifyState::ExpectEndOfFrame,
        ClassifyState::FrameComplete,
        ClassifyState::ValidFrame,
        ClassifyState::ExpectConfig,
        ClassifyState::ExpectProtocolError,
        ClassifyState::ClassifiedValidFrame,
        ClassifyState::MalformedFrame,
        ClassifyState::ErrorInErrorFrame,
        ClassifyState::InternalStateError,
    ];

    fn request_frame(id: u32, method: &str, payload: &[u8]) -> Frame {
        build_frame(
            id,
            method,
            PayloadKind::Request,
            Bytes::copy_from_slice(payload),
            None,
        )
        .unwrap()
    }

    fn kind_frame(kind: PayloadKind, payload: &[u8]) -> Frame {
        build_frame(1, "Method", kind, Bytes::copy_from_slice(payload), None).unwrap()
    }

    fn headers_framelet(id: u32, kind: PayloadKind, method: &str) -> Framelet {
        let headers = Headers::new(id, kind, method, 0);
        Framelet::new(FrameletType::Headers, Bytes::from(headers.encode().unwrap()))
    }

    fn payload_framelet(bytes: &'static [u8]) -> Framelet {
        Framelet::new(FrameletType::PayloadData, Bytes::from_static(bytes))
    }

    // ---- end-to-end classify -------------------------------------------

    #[test]
    fn test_classify_absent_frame_is_indeterminate() {
        for variant in [ProtocolVariant::Lean, ProtocolVariant::Full] {
            let result = classify(None, variant);
            assert_eq!(result.disposition, FrameDisposition::Indeterminate);
            assert!(result.headers.is_none());
            assert!(result.payload.is_none());
            assert!(result.error_code.is_none());
        }
    }

    #[test]
    fn test_classify_empty_frame_is_malformed() {
        let frame = Frame::from_framelets(Vec::new());
        for variant in [ProtocolVariant::Lean, ProtocolVariant::Full] {
            let result = classify(Some(&frame), variant);
            assert_eq!(result.disposition, FrameDisposition::SendProtocolError);
            assert_eq!(result.error_code, Some(ProtocolErrorCode::MalformedData));
            assert!(result.headers.is_none());
            assert!(result.payload.is_none());
        }
    }

    #[test]
    fn test_classify_request_frame() {
        let frame = request_frame(1, "ShaveYaks", b"E");
        for variant in [ProtocolVariant::Lean, ProtocolVariant::Full] {
            let result = classify(Some(&frame), variant);
            assert_eq!(
                result.disposition,
                FrameDisposition::DeliverRequestToService
            );
            let headers = result.headers.as_ref().unwrap();
            assert_eq!(headers.request_id, 1);
            assert_eq!(headers.method_name, "ShaveYaks");
            assert_eq!(headers.kind(), Some(PayloadKind::Request));
            assert_eq!(headers.error_code, 0);
            assert_eq!(result.payload.as_ref().unwrap().as_ref(), b"E");
        }
    }

    #[test]
    fn test_classify_response_frame() {
        let frame = kind_frame(PayloadKind::Response, b"E");
        for variant in [ProtocolVariant::Lean, ProtocolVariant::Full] {
            let result = classify(Some(&frame), variant);
            assert_eq!(result.disposition, FrameDisposition::DeliverResponseToProxy);
            assert_eq!(result.payload.as_ref().unwrap().as_ref(), b"E");
        }
    }

    #[test]
    fn test_classify_event_frame_lean_rejects() {
        let frame = kind_frame(PayloadKind::Event, b"E");
        let result = classify(Some(&frame), ProtocolVariant::Lean);

        assert_eq!(result.disposition, FrameDisposition::SendProtocolError);
        assert_eq!(result.error_code, Some(ProtocolErrorCode::NotSupported));
        assert!(result.headers.is_none());
    }

    #[test]
    fn test_classify_event_frame_full_delivers() {
        let frame = kind_frame(PayloadKind::Event, b"E");
        let result = classify(Some(&frame), ProtocolVariant::Full);

        assert_eq!(result.disposition, FrameDisposition::DeliverEventToService);
        assert_eq!(result.payload.as_ref().unwrap().as_ref(), b"E");
    }

    #[test]
    fn test_classify_layer_data_full() {
        let frame = build_frame(
            5,
            "Traced",
            PayloadKind::Request,
            Bytes::from_static(b"body"),
            Some(Bytes::from_static(b"layer")),
        )
        .unwrap();

        let result = classify(Some(&frame), ProtocolVariant::Full);
        assert_eq!(
            result.disposition,
            FrameDisposition::DeliverRequestToService
        );
        assert_eq!(result.layer_data.as_ref().unwrap().as_ref(), b"layer");
        assert_eq!(result.payload.as_ref().unwrap().as_ref(), b"body");
    }

    #[test]
    fn test_classify_layer_data_lean_rejects() {
        let frame = build_frame(
            5,
            "Traced",
            PayloadKind::Request,
            Bytes::from_static(b"body"),
            Some(Bytes::from_static(b"layer")),
        )
        .unwrap();

        let result = classify(Some(&frame), ProtocolVariant::Lean);
        assert_eq!(result.disposition, FrameDisposition::SendProtocolError);
        assert_eq!(result.error_code, Some(ProtocolErrorCode::MalformedData));
    }

    #[test]
    fn test_classify_trailing_framelet() {
        let frame = Frame::from_framelets(vec![
            headers_framelet(1, PayloadKind::Request, "M"),
            payload_framelet(b"E"),
            payload_framelet(b"extra"),
        ]);

        for variant in [ProtocolVariant::Lean, ProtocolVariant::Full] {
            let result = classify(Some(&frame), variant);
            assert_eq!(result.disposition, FrameDisposition::SendProtocolError);
            assert_eq!(result.error_code, Some(ProtocolErrorCode::MalformedData));
        }
    }

    #[test]
    fn test_classify_reversed_framelets() {
        let frame = Frame::from_framelets(vec![
            payload_framelet(b"E"),
            headers_framelet(1, PayloadKind::Request, "M"),
        ]);

        for variant in [ProtocolVariant::Lean, ProtocolVariant::Full] {
            let result = classify(Some(&frame), variant);
            assert_eq!(result.disposition, FrameDisposition::SendProtocolError);
            assert_eq!(result.error_code, Some(ProtocolErrorCode::MalformedData));
        }
    }

    #[test]
    fn test_classify_duplicate_headers() {
        let frame = Frame::from_framelets(vec![
            headers_framelet(1, PayloadKind::Request, "M"),
            headers_framelet(1, PayloadKind::Request, "M"),
        ]);

        for variant in [ProtocolVariant::Lean, ProtocolVariant::Full] {
            let result = classify(Some(&frame), variant);
            assert_eq!(result.disposition, FrameDisposition::SendProtocolError);
        }
    }

    #[test]
    fn test_classify_missing_payload() {
        let frame =
            Frame::from_framelets(vec![headers_framelet(1, PayloadKind::Request, "M")]);

        for variant in [ProtocolVariant::Lean, ProtocolVariant::Full] {
            let result = classify(Some(&frame), variant);
            assert_eq!(result.disposition, FrameDisposition::SendProtocolError);
        }
    }

    #[test]
    fn test_classify_undecodable_headers() {
        let frame = Frame::from_framelets(vec![
            Framelet::new(FrameletType::Headers, Bytes::from_static(b"\xFFgarbage")),
            payload_framelet(b"E"),
        ]);

        for variant in [ProtocolVariant::Lean, ProtocolVariant::Full] {
            let result = classify(Some(&frame), variant);
            assert_eq!(result.disposition, FrameDisposition::SendProtocolError);
            assert_eq!(result.error_code, Some(ProtocolErrorCode::MalformedData));
        }
    }

    #[test]
    fn test_classify_unknown_first_framelet_type() {
        let frame = Frame::from_framelets(vec![
            Framelet::from_code(0xBEEF, Bytes::from_static(b"?")),
            payload_framelet(b"E"),
        ]);

        for variant in [ProtocolVariant::Lean, ProtocolVariant::Full] {
            let result = classify(Some(&frame), variant);
            assert_eq!(result.disposition, FrameDisposition::SendProtocolError);
            assert_eq!(result.error_code, Some(ProtocolErrorCode::MalformedData));
        }
    }

    #[test]
    fn test_classify_unknown_payload_kind_not_supported() {
        let headers = Headers {
            request_id: 1,
            payload_type: 9,
            method_name: "M".to_string(),
            error_code: 0,
        };
        let frame = Frame::from_framelets(vec![
            Framelet::new(FrameletType::Headers, Bytes::from(headers.encode().unwrap())),
            payload_framelet(b"E"),
        ]);

        for variant in [ProtocolVariant::Lean, ProtocolVariant::Full] {
            let result = classify(Some(&frame), variant);
            assert_eq!(result.disposition, FrameDisposition::SendProtocolError);
            assert_eq!(result.error_code, Some(ProtocolErrorCode::NotSupported));
        }
    }

    #[test]
    fn test_classify_config_frame_full() {
        let frame = build_config_frame().unwrap();
        let result = classify(Some(&frame), ProtocolVariant::Full);

        assert_eq!(result.disposition, FrameDisposition::ProcessConfig);
        assert!(result.headers.is_none());
    }

    #[test]
    fn test_classify_config_frame_lean_rejects() {
        let frame = build_config_frame().unwrap();
        let result = classify(Some(&frame), ProtocolVariant::Lean);

        assert_eq!(result.disposition, FrameDisposition::SendProtocolError);
        assert_eq!(result.error_code, Some(ProtocolErrorCode::MalformedData));
    }

    #[test]
    fn test_classify_config_frame_with_extra_framelet() {
        let mut framelets = build_config_frame().unwrap().framelets().to_vec();
        framelets.push(payload_framelet(b"extra"));
        let frame = Frame::from_framelets(framelets);

        let result = classify(Some(&frame), ProtocolVariant::Full);
        assert_eq!(result.disposition, FrameDisposition::SendProtocolError);
        assert_eq!(result.error_code, Some(ProtocolErrorCode::MalformedData));
    }

    #[test]
    fn test_classify_undecodable_config() {
        let frame = Frame::from_framelets(vec![Framelet::new(
            FrameletType::Config,
            Bytes::from_static(b"\xC1"),
        )]);

        let result = classify(Some(&frame), ProtocolVariant::Full);
        assert_eq!(result.disposition, FrameDisposition::SendProtocolError);
        assert_eq!(result.error_code, Some(ProtocolErrorCode::MalformedData));
    }

    #[test]
    fn test_classify_protocol_error_frame() {
        let frame = build_protocol_error_frame(ProtocolErrorCode::NotSupported).unwrap();
        let result = classify(Some(&frame), ProtocolVariant::Full);

        assert_eq!(result.disposition, FrameDisposition::HandleProtocolError);
        let error = result.error.as_ref().unwrap();
        assert_eq!(error.code(), Some(ProtocolErrorCode::NotSupported));
    }

    #[test]
    fn test_classify_undecodable_protocol_error_hangs_up() {
        let frame = Frame::from_framelets(vec![Framelet::new(
            FrameletType::ProtocolError,
            Bytes::from_static(b"\xC1"),
        )]);

        let result = classify(Some(&frame), ProtocolVariant::Full);
        assert_eq!(result.disposition, FrameDisposition::HangUp);
        assert_eq!(result.error_code, Some(ProtocolErrorCode::ErrorInError));
        assert!(result.headers.is_none());
        assert!(result.payload.is_none());
    }

    #[test]
    fn test_classify_oversized_protocol_error_frame_hangs_up() {
        let mut framelets = build_protocol_error_frame(ProtocolErrorCode::MalformedData)
            .unwrap()
            .framelets()
            .to_vec();
        framelets.push(payload_framelet(b"extra"));
        let frame = Frame::from_framelets(framelets);

        let result = classify(Some(&frame), ProtocolVariant::Full);
        assert_eq!(result.disposition, FrameDisposition::HangUp);
        assert_eq!(result.error_code, Some(ProtocolErrorCode::ErrorInError));
    }

    #[test]
    fn test_classify_protocol_error_frame_lean_rejects() {
        let frame = build_protocol_error_frame(ProtocolErrorCode::MalformedData).unwrap();
        let result = classify(Some(&frame), ProtocolVariant::Lean);

        assert_eq!(result.disposition, FrameDisposition::SendProtocolError);
        assert_eq!(result.error_code, Some(ProtocolErrorCode::MalformedData));
    }

    #[test]
    fn test_payload_is_zero_copy() {
        let frame = request_frame(1, "M", b"shared payload");
        let result = classify(Some(&frame), ProtocolVariant::Full);

        let payload = result.payload.unwrap();
        assert_eq!(
            payload.as_ptr(),
            frame.framelet(1).unwrap().contents().as_ptr()
        );
    }

    #[test]
    fn test_classify_is_pure() {
        let frame = request_frame(1, "M", b"E");
        let first = classify(Some(&frame), ProtocolVariant::Full);
        let second = classify(Some(&frame), ProtocolVariant::Full);
        assert_eq!(first, second);
    }

    // ---- per-transition guards -----------------------------------------

    type Transition =
        fn(ClassifyState, Option<&Frame>, ProtocolVariant, ClassifyResult) -> Step;

    const TRANSITIONS: [(Transition, ClassifyState); 10] = [
        (expect_frame, ClassifyState::ExpectFrame),
        (expect_first_framelet, ClassifyState::ExpectFirstFramelet),
        (expect_headers, ClassifyState::ExpectHeaders),
        (
            expect_optional_layer_data,
            ClassifyState::ExpectOptionalLayerData,
        ),
        (expect_payload, ClassifyState::ExpectPayload),
        (expect_end_of_frame, ClassifyState::ExpectEndOfFrame),
        (frame_complete, ClassifyState::FrameComplete),
        (valid_frame, ClassifyState::ValidFrame),
        (expect_config, ClassifyState::ExpectConfig),
        (expect_protocol_error, ClassifyState::ExpectProtocolError),
    ];

    #[test]
    fn test_every_transition_rejects_wrong_starting_state() {
        let frame = request_frame(1, "M", b"E");
        for (transition, own_state) in TRANSITIONS {
            for state in ALL_STATES {
                if state == own_state {
                    continue;
                }
                let before = ClassifyResult::default();
                let (next, after) =
                    transition(state, Some(&frame), ProtocolVariant::Full, before.clone());
                assert_eq!(
                    next,
                    ClassifyState::InternalStateError,
                    "{state:?} accepted by transition owning {own_state:?}"
                );
                assert_eq!(after, before, "outputs mutated from wrong state {state:?}");
            }
        }
    }

    #[test]
    fn test_every_transition_rejects_absent_frame() {
        // FrameComplete and ValidFrame run off accumulated outputs, not the
        // frame, so they are exercised separately below.
        for (transition, own_state) in TRANSITIONS {
            if matches!(
                own_state,
                ClassifyState::FrameComplete | ClassifyState::ValidFrame
            ) {
                continue;
            }
            let (next, _) = transition(
                own_state,
                None,
                ProtocolVariant::Full,
                ClassifyResult::default(),
            );
            assert_eq!(
                next,
                ClassifyState::InternalStateError,
                "transition owning {own_state:?} accepted an absent frame"
            );
        }
    }

    #[test]
    fn test_transitions_reject_missing_prerequisites() {
        let frame = request_frame(1, "M", b"E");

        // Headers missing where a predecessor should have decoded them.
        for (transition, own_state) in [
            (
                expect_optional_layer_data as Transition,
                ClassifyState::ExpectOptionalLayerData,
            ),
            (expect_payload, ClassifyState::ExpectPayload),
            (expect_end_of_frame, ClassifyState::ExpectEndOfFrame),
            (frame_complete, ClassifyState::FrameComplete),
            (valid_frame, ClassifyState::ValidFrame),
        ] {
            let (next, _) = transition(
                own_state,
                Some(&frame),
                ProtocolVariant::Full,
                ClassifyResult::default(),
            );
            assert_eq!(
                next,
                ClassifyState::InternalStateError,
                "transition owning {own_state:?} ran without decoded headers"
            );
        }

        // Payload missing at end-of-frame.
        let out = ClassifyResult {
            headers: Some(Headers::new(1, PayloadKind::Request, "M", 0)),
            ..Default::default()
        };
        let (next, _) =
            expect_end_of_frame(ClassifyState::ExpectEndOfFrame, Some(&frame), ProtocolVariant::Full, out);
        assert_eq!(next, ClassifyState::InternalStateError);
    }

    #[test]
    fn test_expect_frame_happy_path() {
        let frame = request_frame(1, "M", b"E");
        let (next, out) = expect_frame(
            ClassifyState::ExpectFrame,
            Some(&frame),
            ProtocolVariant::Full,
            ClassifyResult::default(),
        );
        assert_eq!(next, ClassifyState::ExpectFirstFramelet);
        assert_eq!(out, ClassifyResult::default());
    }

    #[test]
    fn test_expect_first_framelet_routes_by_type() {
        let message = request_frame(1, "M", b"E");
        let config = build_config_frame().unwrap();
        let error = build_protocol_error_frame(ProtocolErrorCode::MalformedData).unwrap();

        let (next, _) = expect_first_framelet(
            ClassifyState::ExpectFirstFramelet,
            Some(&message),
            ProtocolVariant::Full,
            ClassifyResult::default(),
        );
        assert_eq!(next, ClassifyState::ExpectHeaders);

        let (next, _) = expect_first_framelet(
            ClassifyState::ExpectFirstFramelet,
            Some(&config),
            ProtocolVariant::Full,
            ClassifyResult::default(),
        );
        assert_eq!(next, ClassifyState::ExpectConfig);

        let (next, _) = expect_first_framelet(
            ClassifyState::ExpectFirstFramelet,
            Some(&error),
            ProtocolVariant::Full,
            ClassifyResult::default(),
        );
        assert_eq!(next, ClassifyState::ExpectProtocolError);

        // Lean admits only Headers at index 0.
        for frame in [&config, &error] {
            let (next, out) = expect_first_framelet(
                ClassifyState::ExpectFirstFramelet,
                Some(frame),
                ProtocolVariant::Lean,
                ClassifyResult::default(),
            );
            assert_eq!(next, ClassifyState::MalformedFrame);
            assert_eq!(out.error_code, Some(ProtocolErrorCode::MalformedData));
        }
    }

    #[test]
    fn test_expect_headers_decodes_and_branches_by_variant() {
        let frame = request_frame(42, "Branch", b"E");

        let (next, out) = expect_headers(
            ClassifyState::ExpectHeaders,
            Some(&frame),
            ProtocolVariant::Full,
            ClassifyResult::default(),
        );
        assert_eq!(next, ClassifyState::ExpectOptionalLayerData);
        assert_eq!(out.headers.as_ref().unwrap().request_id, 42);

        let (next, out) = expect_headers(
            ClassifyState::ExpectHeaders,
            Some(&frame),
            ProtocolVariant::Lean,
            ClassifyResult::default(),
        );
        assert_eq!(next, ClassifyState::ExpectPayload);
        assert_eq!(out.headers.as_ref().unwrap().method_name, "Branch");
    }

    #[test]
    fn test_expect_optional_layer_data_records_contents() {
        let with_layer = build_frame(
            1,
            "M",
            PayloadKind::Request,
            Bytes::from_static(b"body"),
            Some(Bytes::from_static(b"layer")),
        )
        .unwrap();
        let without_layer = request_frame(1, "M", b"body");

        let seeded = ClassifyResult {
            headers: Some(Headers::new(1, PayloadKind::Request, "M", 0)),
            ..Default::default()
        };

        let (next, out) = expect_optional_layer_data(
            ClassifyState::ExpectOptionalLayerData,
            Some(&with_layer),
            ProtocolVariant::Full,
            seeded.clone(),
        );
        assert_eq!(next, ClassifyState::ExpectPayload);
        assert_eq!(out.layer_data.as_ref().unwrap().as_ref(), b"layer");

        let (next, out) = expect_optional_layer_data(
            ClassifyState::ExpectOptionalLayerData,
            Some(&without_layer),
            ProtocolVariant::Full,
            seeded,
        );
        assert_eq!(next, ClassifyState::ExpectPayload);
        assert!(out.layer_data.is_none());
    }

    #[test]
    fn test_expect_payload_indexes_past_layer_data() {
        let with_layer = build_frame(
            1,
            "M",
            PayloadKind::Request,
            Bytes::from_static(b"body"),
            Some(Bytes::from_static(b"layer")),
        )
        .unwrap();

        let seeded = ClassifyResult {
            headers: Some(Headers::new(1, PayloadKind::Request, "M", 0)),
            layer_data: Some(Bytes::from_static(b"layer")),
            ..Default::default()
        };

        let (next, out) = expect_payload(
            ClassifyState::ExpectPayload,
            Some(&with_layer),
            ProtocolVariant::Full,
            seeded,
        );
        assert_eq!(next, ClassifyState::ExpectEndOfFrame);
        assert_eq!(out.payload.as_ref().unwrap().as_ref(), b"body");
    }

    #[test]
    fn test_safety_net_budget_covers_longest_path() {
        // The longest legal path (full variant, layer data) takes eight
        // transitions plus the terminal observation; well inside the budget.
        let frame = build_frame(
            1,
            "M",
            PayloadKind::Request,
            Bytes::from_static(b"body"),
            Some(Bytes::from_static(b"layer")),
        )
        .unwrap();
        let result = classify(Some(&frame), ProtocolVariant::Full);
        assert_eq!(
            result.disposition,
            FrameDisposition::DeliverRequestToService
        );
    }

    // ---- properties -----------------------------------------------------

    fn arb_kind() -> impl Strategy<Value = PayloadKind> {
        prop_oneof![
            Just(PayloadKind::Request),
            Just(PayloadKind::Response),
            Just(PayloadKind::Event),
        ]
    }

    proptest! {
        #[test]
        fn prop_classify_roundtrips_built_frames(
            id in any::<u32>(),
            method in "[A-Za-z][A-Za-z0-9_]{0,24}",
            kind in arb_kind(),
            payload in proptest::collection::vec(any::<u8>(), 0..512),
        ) {
            let frame = build_frame(
                id,
                &method,
                kind,
                Bytes::from(payload.clone()),
                None,
            ).unwrap();

            let result = classify(Some(&frame), ProtocolVariant::Full);
            let expected = match kind {
                PayloadKind::Request => FrameDisposition::DeliverRequestToService,
                PayloadKind::Response => FrameDisposition::DeliverResponseToProxy,
                PayloadKind::Event => FrameDisposition::DeliverEventToService,
            };
            prop_assert_eq!(result.disposition, expected);

            let headers = result.headers.as_ref().unwrap();
            prop_assert_eq!(headers.request_id, id);
            prop_assert_eq!(&headers.method_name, &method);
            prop_assert_eq!(result.payload.as_ref().unwrap().as_ref(), &payload[..]);
        }

        #[test]
        fn prop_lean_accepts_requests_and_responses_only(
            id in any::<u32>(),
            method in "[A-Za-z][A-Za-z0-9_]{0,24}",
            kind in arb_kind(),
            payload in proptest::collection::vec(any::<u8>(), 0..128),
        ) {
            let frame = build_frame(id, &method, kind, Bytes::from(payload), None).unwrap();
            let result = classify(Some(&frame), ProtocolVariant::Lean);

            match kind {
                PayloadKind::Request => prop_assert_eq!(
                    result.disposition,
                    FrameDisposition::DeliverRequestToService
                ),
                PayloadKind::Response => prop_assert_eq!(
                    result.disposition,
                    FrameDisposition::DeliverResponseToProxy
                ),
                PayloadKind::Event => {
                    prop_assert_eq!(
                        result.disposition,
                        FrameDisposition::SendProtocolError
                    );
                    prop_assert_eq!(
                        result.error_code,
                        Some(ProtocolErrorCode::NotSupported)
                    );
                }
            }
        }

        #[test]
        fn prop_classify_is_deterministic(
            id in any::<u32>(),
            method in "[A-Za-z]{1,8}",
            payload in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            let frame = build_frame(
                id,
                &method,
                PayloadKind::Request,
                Bytes::from(payload),
                None,
            ).unwrap();

            prop_assert_eq!(
                classify(Some(&frame), ProtocolVariant::Full),
                classify(Some(&frame), ProtocolVariant::Full)
            );
        }
    }
}
