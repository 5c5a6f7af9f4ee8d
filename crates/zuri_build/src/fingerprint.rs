//! Build fingerprints.
//!
//! A fingerprint covers everything that can change a module's IR: the
//! toolchain and schema versions, the module id, its source bytes, the
//! optimization switch and the fingerprints of its direct dependencies.
//! Dependency fingerprints already cover their own dependencies, so the
//! result is transitive.

use zuri_common::{Fingerprint, FingerprintBuilder, COMPILER_VERSION};
use zuri_ir::CURRENT_SCHEMA_VERSION;
use zuri_lower::{Session, SessionImport, SessionSymbol};
use zuri_source::ModuleId;

const MODULE_DOMAIN: &str = "zuri.module.v1";
const FRAGMENT_DOMAIN: &str = "zuri.fragment.v1";

/// Inputs of a module fingerprint.
#[derive(Debug, Clone, Copy)]
pub struct FingerprintInputs<'a> {
    /// The module id.
    pub module: &'a ModuleId,
    /// The source text.
    pub source: &'a str,
    /// `(module id, fingerprint)` of every direct dependency, in any order.
    pub dependencies: &'a [(ModuleId, Fingerprint)],
    /// Whether constant folding is enabled.
    pub optimize: bool,
}

fn common(domain: &str, inputs: &FingerprintInputs<'_>) -> FingerprintBuilder {
    let mut builder = FingerprintBuilder::new(domain);
    builder
        .str(COMPILER_VERSION)
        .u64(u64::from(CURRENT_SCHEMA_VERSION))
        .str(inputs.module.as_str())
        .bytes(inputs.source.as_bytes())
        .u64(u64::from(inputs.optimize));

    let mut deps: Vec<&(ModuleId, Fingerprint)> = inputs.dependencies.iter().collect();
    deps.sort();
    deps.dedup();
    builder.u64(deps.len() as u64);
    for (module, fp) in deps {
        builder.str(module.as_str()).fingerprint(fp);
    }
    builder
}

/// Fingerprint of a module compiled from source.
pub fn module_fingerprint(inputs: &FingerprintInputs<'_>) -> Fingerprint {
    common(MODULE_DOMAIN, inputs).finish()
}

/// Fingerprint of a REPL fragment, which also depends on the session
/// globals and namespaces visible to it.
pub fn fragment_fingerprint(inputs: &FingerprintInputs<'_>, session: &Session) -> Fingerprint {
    let mut builder = common(FRAGMENT_DOMAIN, inputs);
    let mut symbols: Vec<&SessionSymbol> = session.globals.iter().collect();
    symbols.sort_by(|a, b| a.name.cmp(&b.name));
    builder.u64(symbols.len() as u64);
    for symbol in symbols {
        builder.str(&symbol.name).u64(u64::from(symbol.mutable));
    }
    let mut imports: Vec<&SessionImport> = session.imports.iter().collect();
    imports.sort_by(|a, b| a.alias.cmp(&b.alias));
    builder.u64(imports.len() as u64);
    for import in imports {
        builder
            .str(&import.alias)
            .str(import.module.as_str())
            .fingerprint(&import.fingerprint);
    }
    builder.finish()
}
