//! Versioned binary encoding of [`IrModule`]s.
//!
//! Layout: a little-endian `u16` schema version, the magic `ZRIR`, then the
//! module encoded with bincode's standard configuration. The version comes
//! first so readers can reject newer data before looking at anything else.

use crate::error::SchemaError;
use crate::module::IrModule;

/// Schema version written by this toolchain.
pub const CURRENT_SCHEMA_VERSION: u16 = 1;

const MAGIC: [u8; 4] = *b"ZRIR";
const HEADER_LEN: usize = 2 + MAGIC.len();

/// Encodes a module. Equal modules always produce equal bytes.
pub fn serialize(module: &IrModule) -> Result<Vec<u8>, SchemaError> {
    let body = bincode::serde::encode_to_vec(module, bincode::config::standard()).map_err(|e| {
        SchemaError::Corrupt {
            reason: format!("failed to encode module '{}': {e}", module.name),
        }
    })?;
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&CURRENT_SCHEMA_VERSION.to_le_bytes());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decodes bytes written by [`serialize`] at the current schema version.
pub fn deserialize(bytes: &[u8]) -> Result<IrModule, SchemaError> {
    deserialize_compat(bytes, CURRENT_SCHEMA_VERSION)
}

/// Decodes bytes as a reader that understands schemas up to `max_version`.
///
/// A version tag above `max_version` fails with
/// [`SchemaError::UnsupportedVersion`] without touching the body.
pub fn deserialize_compat(bytes: &[u8], max_version: u16) -> Result<IrModule, SchemaError> {
    let version = peek_schema_version(bytes)?;
    let supported = max_version.min(CURRENT_SCHEMA_VERSION);
    if version > supported || version == 0 {
        return Err(SchemaError::UnsupportedVersion {
            found: version,
            supported,
        });
    }
    if bytes.len() < HEADER_LEN || bytes[2..HEADER_LEN] != MAGIC {
        return Err(SchemaError::Corrupt {
            reason: "missing IR magic bytes".to_string(),
        });
    }
    let body = &bytes[HEADER_LEN..];
    let (module, read): (IrModule, usize) =
        bincode::serde::decode_from_slice(body, bincode::config::standard()).map_err(|e| {
            SchemaError::Corrupt {
                reason: e.to_string(),
            }
        })?;
    if read != body.len() {
        return Err(SchemaError::Corrupt {
            reason: format!("{} trailing bytes after module", body.len() - read),
        });
    }
    Ok(module)
}

/// Reads the schema version tag without decoding the body.
pub fn peek_schema_version(bytes: &[u8]) -> Result<u16, SchemaError> {
    match bytes {
        [lo, hi, ..] => Ok(u16::from_le_bytes([*lo, *hi])),
        _ => Err(SchemaError::Corrupt {
            reason: format!("{} bytes is too short for an IR header", bytes.len()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Constant, Expr, ExprKind, IrSpan, Stmt};
    use crate::module::{Global, GlobalKind};
    use crate::types::TypeDb;

    fn sample() -> IrModule {
        let mut module = IrModule::new("app.main");
        let name = module.symbols.intern("answer");
        let global = module.globals.alloc(Global {
            name,
            mutable: false,
            ty: TypeDb::INT,
            kind: GlobalKind::Value,
        });
        module.init.body.push(Stmt::SetGlobal {
            global,
            value: Expr {
                kind: ExprKind::Const(Constant::Int(42)),
                ty: TypeDb::INT,
                span: IrSpan::new(13, 15),
            },
        });
        module.export_all();
        module
    }

    #[test]
    fn version_is_first() {
        let bytes = serialize(&sample()).unwrap();
        assert_eq!(&bytes[..2], &CURRENT_SCHEMA_VERSION.to_le_bytes());
        assert_eq!(&bytes[2..6], b"ZRIR");
        assert_eq!(peek_schema_version(&bytes).unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn decode_restores_module() {
        let module = sample();
        let bytes = serialize(&module).unwrap();
        assert_eq!(deserialize(&bytes).unwrap(), module);
        assert_eq!(serialize(&module).unwrap(), bytes);
    }

    #[test]
    fn newer_version_is_rejected() {
        let mut bytes = serialize(&sample()).unwrap();
        bytes[..2].copy_from_slice(&(CURRENT_SCHEMA_VERSION + 1).to_le_bytes());
        assert_eq!(
            deserialize(&bytes).unwrap_err(),
            SchemaError::UnsupportedVersion {
                found: CURRENT_SCHEMA_VERSION + 1,
                supported: CURRENT_SCHEMA_VERSION
            }
        );
    }

    #[test]
    fn older_reader_rejects_current_bytes() {
        let bytes = serialize(&sample()).unwrap();
        let err = deserialize_compat(&bytes, 0).unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedVersion { found: 1, .. }));
        assert_eq!(err.code().to_string(), "E301");
    }

    #[test]
    fn truncation_is_corrupt() {
        let bytes = serialize(&sample()).unwrap();
        assert!(matches!(
            deserialize(&bytes[..bytes.len() - 3]),
            Err(SchemaError::Corrupt { .. })
        ));
        assert!(matches!(deserialize(&[1]), Err(SchemaError::Corrupt { .. })));
    }

    #[test]
    fn bad_magic_is_corrupt() {
        let mut bytes = serialize(&sample()).unwrap();
        bytes[3] = b'X';
        assert!(matches!(deserialize(&bytes), Err(SchemaError::Corrupt { .. })));
    }

    #[test]
    fn trailing_bytes_are_corrupt() {
        let mut bytes = serialize(&sample()).unwrap();
        bytes.push(0);
        assert!(matches!(deserialize(&bytes), Err(SchemaError::Corrupt { .. })));
    }
}
