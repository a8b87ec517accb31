//! Device property read-back.
//!
//! Properties arrive as untyped 8/16/32 bit arrays plus a type atom. For the handful of numeric
//! types X defines, we unpack into numbers, everything else is handed back as bytes.

use std::collections::BTreeMap;

use crate::server::{Atom, PropertyData, Server, ServerError};
use crate::strings::property_type;

/// Most bytes read from a single property. Anything bigger is an error, never truncated.
pub const PROPERTY_BUFFER_SIZE: u32 = 64 * 1024;
/// Wildcard type for XIGetProperty.
const ANY_PROPERTY_TYPE: Atom = 0;

/// One unpacked property item.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Number {
    /// From an `INTEGER` property.
    Signed(i32),
    /// From a `CARDINAL` property.
    Unsigned(u32),
    /// From a `FLOAT` property.
    Float(f32),
}

/// A decoded property value.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    /// Numeric property with exactly one item.
    Scalar(Number),
    /// Numeric property with any other number of items.
    Sequence(Vec<Number>),
    /// Property of a type we don't unpack, in server byte order.
    Bytes(Vec<u8>),
}

#[derive(thiserror::Error, Debug)]
pub enum PropertyError {
    /// More data is waiting on the server than we're willing to read.
    #[error("buffer too small: {pending} bytes left unread")]
    BufferTooSmall { pending: u32 },
    /// A specific type was asked for, and the property is something else.
    #[error("property has type atom {actual}, expected {requested}")]
    WrongType { requested: Atom, actual: Atom },
    /// A numeric type with a bit width that type can't have.
    #[error("{type_name} property with format {format}")]
    UnsupportedFormat { type_name: String, format: u8 },
    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Read and decode a property. `Ok(None)` if the device doesn't have it.
///
/// With `requested` set, a property of any other type is an error.
pub(crate) fn get<S: Server + ?Sized>(
    server: &S,
    deviceid: u16,
    property: Atom,
    requested: Option<Atom>,
) -> Result<Option<PropertyValue>, PropertyError> {
    let reply = server.get_property(
        deviceid,
        property,
        requested.unwrap_or(ANY_PROPERTY_TYPE),
        0,
        // Len, in 4-byte units.
        PROPERTY_BUFFER_SIZE / 4,
    )?;

    // None type == property doesn't exist.
    if reply.type_ == 0 {
        return Ok(None);
    }
    // On a type mismatch the server sends no data and reports the whole thing as `bytes_after`,
    // so this has to come before the size check.
    if let Some(requested) = requested {
        if requested != reply.type_ {
            return Err(PropertyError::WrongType {
                requested,
                actual: reply.type_,
            });
        }
    }
    if reply.bytes_after > 0 {
        return Err(PropertyError::BufferTooSmall {
            pending: reply.bytes_after,
        });
    }

    let type_name = server.atom_name(reply.type_)?.unwrap_or_default();
    decode(&type_name, reply.data).map(Some)
}

/// Read every property of a device, by name. Unreadable ones are skipped.
pub(crate) fn get_all<S: Server + ?Sized>(
    server: &S,
    deviceid: u16,
) -> Result<BTreeMap<String, PropertyValue>, ServerError> {
    let mut properties = BTreeMap::new();
    for atom in server.list_properties(deviceid)? {
        let name = match server.atom_name(atom) {
            Ok(Some(name)) => name,
            Ok(None) => continue,
            Err(err) => {
                tracing::debug!(deviceid, atom, %err, "skipping unnamed property");
                continue;
            }
        };
        match get(server, deviceid, atom, None) {
            Ok(Some(value)) => {
                properties.insert(name, value);
            }
            // Deleted between listing and reading.
            Ok(None) => (),
            Err(err) => {
                tracing::debug!(deviceid, property = %name, %err, "skipping property");
            }
        }
    }
    Ok(properties)
}

/// Unpack raw property data according to its type name and bit width.
#[allow(clippy::missing_errors_doc)]
pub fn decode(type_name: &str, data: PropertyData) -> Result<PropertyValue, PropertyError> {
    use property_type::{CARDINAL, FLOAT, INTEGER};
    // Signedness is not reported by the reply type system, it's up to the type atom.
    #[allow(clippy::cast_possible_wrap)]
    let numbers: Vec<Number> = match (type_name, &data) {
        (INTEGER, PropertyData::Data8(v)) => {
            v.iter().map(|&x| Number::Signed((x as i8).into())).collect()
        }
        (INTEGER, PropertyData::Data16(v)) => {
            v.iter().map(|&x| Number::Signed((x as i16).into())).collect()
        }
        (INTEGER, PropertyData::Data32(v)) => v.iter().map(|&x| Number::Signed(x as i32)).collect(),
        (CARDINAL, PropertyData::Data8(v)) => {
            v.iter().map(|&x| Number::Unsigned(x.into())).collect()
        }
        (CARDINAL, PropertyData::Data16(v)) => {
            v.iter().map(|&x| Number::Unsigned(x.into())).collect()
        }
        (CARDINAL, PropertyData::Data32(v)) => v.iter().map(|&x| Number::Unsigned(x)).collect(),
        (FLOAT, PropertyData::Data32(v)) => {
            v.iter().map(|&x| Number::Float(f32::from_bits(x))).collect()
        }
        (FLOAT, _) => {
            return Err(PropertyError::UnsupportedFormat {
                type_name: type_name.to_owned(),
                format: data.format(),
            })
        }
        _ => return Ok(PropertyValue::Bytes(into_bytes(data))),
    };

    Ok(if numbers.len() == 1 {
        PropertyValue::Scalar(numbers[0])
    } else {
        PropertyValue::Sequence(numbers)
    })
}

fn into_bytes(data: PropertyData) -> Vec<u8> {
    match data {
        PropertyData::Data8(v) => v,
        PropertyData::Data16(v) => v.iter().flat_map(|x| x.to_ne_bytes()).collect(),
        PropertyData::Data32(v) => v.iter().flat_map(|x| x.to_ne_bytes()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::PropertyReply;
    use crate::testing::{atoms, MockServer};

    fn reply(type_: Atom, data: PropertyData) -> PropertyReply {
        PropertyReply {
            type_,
            bytes_after: 0,
            data,
        }
    }

    #[test]
    fn cardinal_sequence_and_scalar() {
        let server = MockServer::new()
            .with_property(3, 500, reply(atoms::CARDINAL, PropertyData::Data16(vec![1, 2, 65535])))
            .with_property(3, 501, reply(atoms::CARDINAL, PropertyData::Data32(vec![7])));

        assert_eq!(
            get(&server, 3, 500, None).unwrap(),
            Some(PropertyValue::Sequence(vec![
                Number::Unsigned(1),
                Number::Unsigned(2),
                Number::Unsigned(65535)
            ]))
        );
        assert_eq!(
            get(&server, 3, 501, None).unwrap(),
            Some(PropertyValue::Scalar(Number::Unsigned(7)))
        );
    }

    #[test]
    fn reads_up_to_quota_with_any_type() {
        let server = MockServer::new()
            .with_property(3, 500, reply(atoms::CARDINAL, PropertyData::Data8(vec![1])));
        get(&server, 3, 500, None).unwrap();
        let (deviceid, property, type_, offset, len) = server.last_property_request().unwrap();
        assert_eq!((deviceid, property, type_, offset), (3, 500, ANY_PROPERTY_TYPE, 0));
        assert_eq!(len * 4, PROPERTY_BUFFER_SIZE);
    }

    #[test]
    fn integer_is_signed() {
        assert_eq!(
            decode(INTEGER_NAME, PropertyData::Data8(vec![0xFF])).unwrap(),
            PropertyValue::Scalar(Number::Signed(-1))
        );
        assert_eq!(
            decode(INTEGER_NAME, PropertyData::Data16(vec![0x8000, 1])).unwrap(),
            PropertyValue::Sequence(vec![Number::Signed(-32768), Number::Signed(1)])
        );
        assert_eq!(
            decode(INTEGER_NAME, PropertyData::Data32(vec![u32::MAX])).unwrap(),
            PropertyValue::Scalar(Number::Signed(-1))
        );
    }
    const INTEGER_NAME: &str = property_type::INTEGER;

    #[test]
    fn float_and_opaque() {
        assert_eq!(
            decode(property_type::FLOAT, PropertyData::Data32(vec![1.5f32.to_bits()])).unwrap(),
            PropertyValue::Scalar(Number::Float(1.5))
        );
        assert_eq!(
            decode("STRING", PropertyData::Data8(b"evdev".to_vec())).unwrap(),
            PropertyValue::Bytes(b"evdev".to_vec())
        );
        assert_eq!(
            decode("ATOM", PropertyData::Data32(vec![1])).unwrap(),
            PropertyValue::Bytes(1u32.to_ne_bytes().to_vec())
        );
        assert!(matches!(
            decode(property_type::FLOAT, PropertyData::Data16(vec![1])),
            Err(PropertyError::UnsupportedFormat { format: 16, .. })
        ));
    }

    #[test]
    fn empty_numeric_is_empty_sequence() {
        assert_eq!(
            decode(property_type::CARDINAL, PropertyData::Data32(vec![])).unwrap(),
            PropertyValue::Sequence(vec![])
        );
    }

    #[test]
    fn oversized_property_is_an_error() {
        let server = MockServer::new().with_property(
            3,
            500,
            PropertyReply {
                type_: atoms::CARDINAL,
                bytes_after: 12,
                data: PropertyData::Data32(vec![0; 16384]),
            },
        );
        assert!(matches!(
            get(&server, 3, 500, None),
            Err(PropertyError::BufferTooSmall { pending: 12 })
        ));
    }

    #[test]
    fn missing_and_mistyped() {
        let server = MockServer::new().with_property(
            3,
            500,
            PropertyReply {
                type_: atoms::CARDINAL,
                // Mismatch replies carry no data.
                bytes_after: 4,
                data: PropertyData::Data32(vec![]),
            },
        );
        assert_eq!(get(&server, 3, 999, None).unwrap(), None);
        assert!(matches!(
            get(&server, 3, 500, Some(atoms::INTEGER)),
            Err(PropertyError::WrongType {
                requested: atoms::INTEGER,
                actual: atoms::CARDINAL
            })
        ));
    }

    #[test]
    fn server_errors_are_distinct() {
        let server = MockServer::new().with_failing_property(3, 500, 2);
        assert!(matches!(
            get(&server, 3, 500, None),
            Err(PropertyError::Server(ServerError::Request { code: 2 }))
        ));
    }

    #[test]
    fn get_all_skips_broken_properties() {
        let server = MockServer::new()
            .with_atom(500, "Device Enabled")
            .with_atom(501, "Broken")
            .with_property(3, 500, reply(atoms::INTEGER, PropertyData::Data8(vec![1])))
            .with_failing_property(3, 501, 2)
            // Readable, but its name atom is gone.
            .with_property(3, 502, reply(atoms::INTEGER, PropertyData::Data8(vec![7])));
        let all = get_all(&server, 3).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(
            all.get("Device Enabled"),
            Some(&PropertyValue::Scalar(Number::Signed(1)))
        );
    }
}
