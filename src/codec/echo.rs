//! ECHO_REQUEST / ECHO_REPLY: an opaque payload, echoed byte-for-byte.
use {Repr, Result};

/// The body of an ECHO_REQUEST or ECHO_REPLY. There is nothing to interpret
/// here; the control path copies `payload` from request to reply unchanged.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct EchoRepr {
    pub payload: Vec<u8>,
}

impl Repr for EchoRepr {
    fn parse(buffer: &[u8]) -> Result<Self> {
        Ok(EchoRepr {
            payload: buffer.to_vec(),
        })
    }

    fn buffer_len(&self) -> usize {
        self.payload.len()
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        buffer[..self.payload.len()].copy_from_slice(&self.payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_round_trips_arbitrary_payload() {
        let echo = EchoRepr {
            payload: vec![1, 2, 3, 4, 5],
        };
        let mut buf = vec![0u8; echo.buffer_len()];
        echo.emit(&mut buf).unwrap();
        assert_eq!(buf, echo.payload);
        assert_eq!(EchoRepr::parse(&buf).unwrap(), echo);
    }

    #[test]
    fn echo_handles_empty_payload() {
        let echo = EchoRepr { payload: vec![] };
        let buf: Vec<u8> = vec![];
        assert_eq!(EchoRepr::parse(&buf).unwrap(), echo);
    }
}
