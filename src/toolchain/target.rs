//! Target triple inspection and the host/target architecture query.

use std::path::Path;

/// Name cargo uses for the target's output directory.
///
/// For a custom target file (`targets/x86_64-syskrnl.json`) that is the file
/// stem; for a plain triple it is the triple itself.
pub fn target_name(triple: &str) -> &str {
    if triple.ends_with(".json") {
        return Path::new(triple)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(triple);
    }
    triple
}

/// Processor architecture component of a target triple.
pub fn target_arch(triple: &str) -> &str {
    let name = target_name(triple);
    name.split('-').next().unwrap_or(name)
}

pub fn host_arch() -> &'static str {
    std::env::consts::ARCH
}

/// Collapse spellings of the same ISA to the names `std::env::consts::ARCH`
/// reports.
fn canonical_arch(arch: &str) -> &str {
    match arch {
        "i386" | "i486" | "i586" | "i686" => "x86",
        "amd64" => "x86_64",
        "arm64" => "aarch64",
        a if a.starts_with("armv") || a.starts_with("thumbv") => "arm",
        a if a.starts_with("riscv64") => "riscv64",
        a if a.starts_with("riscv32") => "riscv32",
        a => a,
    }
}

pub fn arch_matches(host: &str, target: &str) -> bool {
    canonical_arch(host) == canonical_arch(target)
}

/// True when binaries built for `triple` can be handled by the host's
/// native binutils.
pub fn host_matches_target_arch(triple: &str) -> bool {
    arch_matches(host_arch(), target_arch(triple))
}
