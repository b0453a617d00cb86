use std::fs::OpenOptions;

/// Who may read a store file once it is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileVisibility {
    /// Owner read/write only (`0600` on Unix). Used for anything holding secrets.
    Private,
    /// Platform default permissions.
    Shared,
}

impl FileVisibility {
    /// Unix file mode used when creating the file.
    pub fn mode(&self) -> u32 {
        match self {
            FileVisibility::Private => 0o600,
            FileVisibility::Shared => 0o644,
        }
    }

    /// Apply the mode to a file about to be created.
    ///
    /// The mode only takes effect at creation time, which is why store writes
    /// always go through a fresh temp file.
    pub(crate) fn apply(&self, options: &mut OpenOptions) {
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(self.mode());
        }

        #[cfg(not(unix))]
        {
            let _ = options;
        }
    }
}
