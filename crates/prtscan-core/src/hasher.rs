use fnv::FnvHasher;
use std::hash::Hasher;

/// Short, stable fingerprint of a file's content.
///
/// FNV-1a is used only to recognise byte-identical workflow files on
/// different branches. It offers no protection against crafted collisions.
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = FnvHasher::default();
    hasher.write(bytes);
    hex::encode(hasher.finish().to_be_bytes())
}
