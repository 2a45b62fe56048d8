//! Raw-bytes codec for dynamic gRPC dispatch.
//!
//! tonic is generic over a codec; this one carries `DynamicMessage`s built
//! from reflection descriptors instead of generated types, so the gateway
//! can invoke methods it has never seen at compile time.

use prost::Message;
use prost_reflect::{DynamicMessage, MessageDescriptor};
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::Status;

/// Codec for one resolved method: request and response descriptors.
#[derive(Debug, Clone)]
pub struct DynamicCodec {
    request: MessageDescriptor,
    response: MessageDescriptor,
}

impl DynamicCodec {
    pub fn new(request: MessageDescriptor, response: MessageDescriptor) -> Self {
        Self { request, response }
    }
}

impl Codec for DynamicCodec {
    type Encode = DynamicMessage;
    type Decode = DynamicMessage;
    type Encoder = DynamicEncoder;
    type Decoder = DynamicDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        DynamicEncoder {
            _descriptor: self.request.clone(),
        }
    }

    fn decoder(&mut self) -> Self::Decoder {
        DynamicDecoder {
            descriptor: self.response.clone(),
        }
    }
}

#[derive(Debug)]
pub struct DynamicEncoder {
    _descriptor: MessageDescriptor,
}

impl Encoder for DynamicEncoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        item.encode(dst)
            .map_err(|e| Status::internal(format!("message encoding failed: {}", e)))
    }
}

#[derive(Debug)]
pub struct DynamicDecoder {
    descriptor: MessageDescriptor,
}

impl Decoder for DynamicDecoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        let message = DynamicMessage::decode(self.descriptor.clone(), src)
            .map_err(|e| Status::internal(format!("message decoding failed: {}", e)))?;
        Ok(Some(message))
    }
}
