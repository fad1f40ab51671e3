use std::path::PathBuf;

xflags::xflags! {
    /// Locate the Embedded Firmware Structure in an AMD firmware image and print it.
    cmd efs-dump {
        /// The flash image to inspect.
        required image: PathBuf
        /// Config file to use instead of `EfsDump.toml`.
        optional --config path: PathBuf
        /// Physical address just past the last byte of the image (defaults to 4GiB).
        optional --mapping-top address: String
        /// Log every candidate address that is probed.
        optional -v, --verbose
        /// Also hex-dump the raw bytes of the structure.
        optional --raw
    }
}
