//! SFTP request handler serving the local filesystem
//!
//! One instance serves exactly one negotiated channel. Absolute paths are
//! used as given; relative paths resolve against the server's file root.
//! There is no sandbox.

use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use russh_sftp::protocol::{
    Attrs, Data, File, FileAttributes, Handle, Name, OpenFlags, Status, StatusCode, Version,
};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use super::status::{ok, status_from_io};

/// Largest chunk returned by a single read request
pub const MAX_READ_LEN: u32 = 256 * 1024;

/// Most entries returned by a single readdir request
pub const MAX_NAMES_PER_READDIR: usize = 128;

enum OpenHandle {
    File(tokio::fs::File),
    Dir {
        path: PathBuf,
        entries: tokio::fs::ReadDir,
    },
}

/// SFTP handler for one channel
pub struct FileServer {
    /// Directory relative paths resolve against
    root: Arc<PathBuf>,
    /// Peer and channel, for logs
    label: String,
    /// Open file and directory handles
    handles: HashMap<String, OpenHandle>,
    /// Counter for handle names
    next_handle: u64,
}

impl FileServer {
    /// Create a handler resolving relative paths against `root`
    pub fn new(root: Arc<PathBuf>, label: impl Into<String>) -> Self {
        Self {
            root,
            label: label.into(),
            handles: HashMap::new(),
            next_handle: 0,
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn insert_handle(&mut self, id: u32, handle: OpenHandle) -> Handle {
        self.next_handle += 1;
        let name = self.next_handle.to_string();
        self.handles.insert(name.clone(), handle);
        Handle { id, handle: name }
    }

    fn file_mut(&mut self, handle: &str) -> Result<&mut tokio::fs::File, StatusCode> {
        match self.handles.get_mut(handle) {
            Some(OpenHandle::File(file)) => Ok(file),
            Some(OpenHandle::Dir { .. }) => Err(StatusCode::Failure),
            None => {
                tracing::debug!("Unknown file handle '{}' on {}", handle, self.label);
                Err(StatusCode::Failure)
            }
        }
    }

    async fn apply_attrs(&self, path: &Path, attrs: &FileAttributes) -> Result<(), StatusCode> {
        if let Some(size) = attrs.size {
            let file = tokio::fs::OpenOptions::new()
                .write(true)
                .open(path)
                .await
                .map_err(status_from_io)?;
            file.set_len(size).await.map_err(status_from_io)?;
        }

        #[cfg(unix)]
        if let Some(mode) = attrs.permissions {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(mode & 0o7777);
            tokio::fs::set_permissions(path, permissions)
                .await
                .map_err(status_from_io)?;
        }

        Ok(())
    }
}

impl Drop for FileServer {
    fn drop(&mut self) {
        tracing::info!(
            "SFTP service for {} finished ({} handles left open)",
            self.label,
            self.handles.len()
        );
    }
}

/// Open options for SFTP `pflags`
fn open_options(flags: OpenFlags) -> tokio::fs::OpenOptions {
    let mut options = tokio::fs::OpenOptions::new();
    let create = flags.contains(OpenFlags::CREATE);
    let append = flags.contains(OpenFlags::APPEND);

    options
        .read(flags.contains(OpenFlags::READ))
        .write(flags.contains(OpenFlags::WRITE) || append)
        .append(append)
        .truncate(flags.contains(OpenFlags::TRUNCATE));

    if create && flags.contains(OpenFlags::EXCLUDE) {
        options.create_new(true);
    } else {
        options.create(create);
    }

    options
}

#[async_trait]
impl russh_sftp::server::Handler for FileServer {
    type Error = StatusCode;

    fn unimplemented(&self) -> Self::Error {
        StatusCode::OpUnsupported
    }

    async fn init(
        &mut self,
        version: u32,
        extensions: HashMap<String, String>,
    ) -> Result<Version, Self::Error> {
        tracing::debug!(
            "SFTP init from {}: version {}, {} extensions",
            self.label,
            version,
            extensions.len()
        );
        Ok(Version::new())
    }

    async fn open(
        &mut self,
        id: u32,
        filename: String,
        pflags: OpenFlags,
        _attrs: FileAttributes,
    ) -> Result<Handle, Self::Error> {
        let path = self.resolve(&filename);
        tracing::debug!("open {:?} ({:?}) on {}", path, pflags, self.label);

        let file = open_options(pflags)
            .open(&path)
            .await
            .map_err(status_from_io)?;

        Ok(self.insert_handle(id, OpenHandle::File(file)))
    }

    async fn close(&mut self, id: u32, handle: String) -> Result<Status, Self::Error> {
        match self.handles.remove(&handle) {
            Some(OpenHandle::File(mut file)) => {
                file.flush().await.map_err(status_from_io)?;
                Ok(ok(id))
            }
            Some(OpenHandle::Dir { .. }) => Ok(ok(id)),
            None => Err(StatusCode::Failure),
        }
    }

    async fn read(
        &mut self,
        id: u32,
        handle: String,
        offset: u64,
        len: u32,
    ) -> Result<Data, Self::Error> {
        let file = self.file_mut(&handle)?;
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(status_from_io)?;

        let mut data = vec![0u8; len.min(MAX_READ_LEN) as usize];
        let n = file.read(&mut data).await.map_err(status_from_io)?;
        if n == 0 && !data.is_empty() {
            return Err(StatusCode::Eof);
        }

        data.truncate(n);
        Ok(Data { id, data })
    }

    async fn write(
        &mut self,
        id: u32,
        handle: String,
        offset: u64,
        data: Vec<u8>,
    ) -> Result<Status, Self::Error> {
        let file = self.file_mut(&handle)?;
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(status_from_io)?;
        file.write_all(&data).await.map_err(status_from_io)?;
        Ok(ok(id))
    }

    async fn lstat(&mut self, id: u32, path: String) -> Result<Attrs, Self::Error> {
        let metadata = tokio::fs::symlink_metadata(self.resolve(&path))
            .await
            .map_err(status_from_io)?;
        Ok(Attrs {
            id,
            attrs: FileAttributes::from(&metadata),
        })
    }

    async fn fstat(&mut self, id: u32, handle: String) -> Result<Attrs, Self::Error> {
        let metadata = match self.handles.get_mut(&handle) {
            Some(OpenHandle::File(file)) => {
                file.flush().await.map_err(status_from_io)?;
                file.metadata().await.map_err(status_from_io)?
            }
            Some(OpenHandle::Dir { path, .. }) => {
                tokio::fs::metadata(path.as_path()).await.map_err(status_from_io)?
            }
            None => return Err(StatusCode::Failure),
        };

        Ok(Attrs {
            id,
            attrs: FileAttributes::from(&metadata),
        })
    }

    async fn setstat(
        &mut self,
        id: u32,
        path: String,
        attrs: FileAttributes,
    ) -> Result<Status, Self::Error> {
        let path = self.resolve(&path);
        self.apply_attrs(&path, &attrs).await?;
        Ok(ok(id))
    }

    async fn fsetstat(
        &mut self,
        id: u32,
        handle: String,
        attrs: FileAttributes,
    ) -> Result<Status, Self::Error> {
        let file = self.file_mut(&handle)?;
        file.flush().await.map_err(status_from_io)?;
        if let Some(size) = attrs.size {
            file.set_len(size).await.map_err(status_from_io)?;
        }

        #[cfg(unix)]
        if let Some(mode) = attrs.permissions {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(mode & 0o7777))
                .await
                .map_err(status_from_io)?;
        }

        Ok(ok(id))
    }

    async fn opendir(&mut self, id: u32, path: String) -> Result<Handle, Self::Error> {
        let path = self.resolve(&path);
        let metadata = tokio::fs::metadata(&path).await.map_err(status_from_io)?;
        if !metadata.is_dir() {
            return Err(StatusCode::NoSuchFile);
        }

        let entries = tokio::fs::read_dir(&path).await.map_err(status_from_io)?;
        Ok(self.insert_handle(id, OpenHandle::Dir { path, entries }))
    }

    async fn readdir(&mut self, id: u32, handle: String) -> Result<Name, Self::Error> {
        let entries = match self.handles.get_mut(&handle) {
            Some(OpenHandle::Dir { entries, .. }) => entries,
            _ => return Err(StatusCode::Failure),
        };

        let mut files = Vec::new();
        while files.len() < MAX_NAMES_PER_READDIR {
            let Some(entry) = entries.next_entry().await.map_err(status_from_io)? else {
                break;
            };
            let attrs = match entry.metadata().await {
                Ok(metadata) => FileAttributes::from(&metadata),
                Err(_) => FileAttributes::default(),
            };
            files.push(File::new(entry.file_name().to_string_lossy(), attrs));
        }

        if files.is_empty() {
            return Err(StatusCode::Eof);
        }

        Ok(Name { id, files })
    }

    async fn remove(&mut self, id: u32, filename: String) -> Result<Status, Self::Error> {
        tokio::fs::remove_file(self.resolve(&filename))
            .await
            .map_err(status_from_io)?;
        Ok(ok(id))
    }

    async fn mkdir(
        &mut self,
        id: u32,
        path: String,
        _attrs: FileAttributes,
    ) -> Result<Status, Self::Error> {
        tokio::fs::create_dir(self.resolve(&path))
            .await
            .map_err(status_from_io)?;
        Ok(ok(id))
    }

    async fn rmdir(&mut self, id: u32, path: String) -> Result<Status, Self::Error> {
        tokio::fs::remove_dir(self.resolve(&path))
            .await
            .map_err(status_from_io)?;
        Ok(ok(id))
    }

    async fn realpath(&mut self, id: u32, path: String) -> Result<Name, Self::Error> {
        let resolved = self.resolve(&path);
        let canonical = tokio::fs::canonicalize(&resolved)
            .await
            .unwrap_or(resolved);

        Ok(Name {
            id,
            files: vec![File::dummy(canonical.to_string_lossy())],
        })
    }

    async fn stat(&mut self, id: u32, path: String) -> Result<Attrs, Self::Error> {
        let metadata = tokio::fs::metadata(self.resolve(&path))
            .await
            .map_err(status_from_io)?;
        Ok(Attrs {
            id,
            attrs: FileAttributes::from(&metadata),
        })
    }

    async fn rename(
        &mut self,
        id: u32,
        oldpath: String,
        newpath: String,
    ) -> Result<Status, Self::Error> {
        tokio::fs::rename(self.resolve(&oldpath), self.resolve(&newpath))
            .await
            .map_err(status_from_io)?;
        Ok(ok(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use russh_sftp::server::Handler;
    use tempfile::TempDir;

    fn server(dir: &TempDir) -> FileServer {
        FileServer::new(Arc::new(dir.path().to_path_buf()), "test")
    }

    fn create_flags() -> OpenFlags {
        OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE
    }

    #[tokio::test]
    async fn test_write_then_read_back() {
        let dir = TempDir::new().unwrap();
        let mut server = server(&dir);

        let handle = server
            .open(1, "report.csv".into(), create_flags(), FileAttributes::default())
            .await
            .unwrap();
        server
            .write(2, handle.handle.clone(), 0, b"a,b\n1,2\n".to_vec())
            .await
            .unwrap();
        server.close(3, handle.handle).await.unwrap();

        assert_eq!(
            std::fs::read(dir.path().join("report.csv")).unwrap(),
            b"a,b\n1,2\n"
        );

        let handle = server
            .open(4, "report.csv".into(), OpenFlags::READ, FileAttributes::default())
            .await
            .unwrap();
        let data = server.read(5, handle.handle.clone(), 4, 100).await.unwrap();
        assert_eq!(data.data, b"1,2\n");

        let eof = server.read(6, handle.handle.clone(), 8, 100).await;
        assert!(matches!(eof, Err(StatusCode::Eof)));
        server.close(7, handle.handle).await.unwrap();
    }

    #[tokio::test]
    async fn test_absolute_paths_are_not_rebased() {
        let root = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();
        let target = elsewhere.path().join("outside.txt");
        std::fs::write(&target, b"xyz").unwrap();

        let mut server = server(&root);
        let attrs = server
            .stat(1, target.to_string_lossy().into_owned())
            .await
            .unwrap();
        assert_eq!(attrs.attrs.size, Some(3));
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let dir = TempDir::new().unwrap();
        let mut server = server(&dir);

        let result = server
            .open(1, "missing.txt".into(), OpenFlags::READ, FileAttributes::default())
            .await;
        assert!(matches!(result, Err(StatusCode::NoSuchFile)));
    }

    #[tokio::test]
    async fn test_exclusive_create_fails_on_existing_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("taken"), b"").unwrap();
        let mut server = server(&dir);

        let result = server
            .open(
                1,
                "taken".into(),
                OpenFlags::CREATE | OpenFlags::EXCLUDE | OpenFlags::WRITE,
                FileAttributes::default(),
            )
            .await;
        assert!(matches!(result, Err(StatusCode::Failure)));
    }

    #[tokio::test]
    async fn test_unknown_handle() {
        let dir = TempDir::new().unwrap();
        let mut server = server(&dir);

        assert!(matches!(
            server.read(1, "42".into(), 0, 10).await,
            Err(StatusCode::Failure)
        ));
        assert!(matches!(
            server.close(2, "42".into()).await,
            Err(StatusCode::Failure)
        ));
    }

    #[tokio::test]
    async fn test_directory_listing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("one"), b"1").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let mut server = server(&dir);

        let handle = server.opendir(1, ".".into()).await.unwrap();
        let listing = server.readdir(2, handle.handle.clone()).await.unwrap();
        let mut names: Vec<String> = listing.files.into_iter().map(|f| f.filename).collect();
        names.sort();
        assert_eq!(names, vec!["one".to_string(), "sub".to_string()]);

        assert!(matches!(
            server.readdir(3, handle.handle.clone()).await,
            Err(StatusCode::Eof)
        ));
        server.close(4, handle.handle).await.unwrap();
    }

    #[tokio::test]
    async fn test_large_directory_listed_in_batches() {
        let dir = TempDir::new().unwrap();
        let total = MAX_NAMES_PER_READDIR + 5;
        for i in 0..total {
            std::fs::write(dir.path().join(format!("f{:04}", i)), b"").unwrap();
        }
        let mut server = server(&dir);

        let handle = server.opendir(1, ".".into()).await.unwrap();
        let first = server.readdir(2, handle.handle.clone()).await.unwrap();
        assert_eq!(first.files.len(), MAX_NAMES_PER_READDIR);

        let second = server.readdir(3, handle.handle.clone()).await.unwrap();
        assert_eq!(second.files.len(), 5);

        let mut names: Vec<String> = first
            .files
            .into_iter()
            .chain(second.files)
            .map(|f| f.filename)
            .collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);

        assert!(matches!(
            server.readdir(4, handle.handle.clone()).await,
            Err(StatusCode::Eof)
        ));
        server.close(5, handle.handle).await.unwrap();
    }

    #[tokio::test]
    async fn test_mkdir_rename_remove() {
        let dir = TempDir::new().unwrap();
        let mut server = server(&dir);

        server
            .mkdir(1, "incoming".into(), FileAttributes::default())
            .await
            .unwrap();
        std::fs::write(dir.path().join("incoming/a.txt"), b"a").unwrap();

        server
            .rename(2, "incoming/a.txt".into(), "incoming/b.txt".into())
            .await
            .unwrap();
        assert!(dir.path().join("incoming/b.txt").exists());

        server.remove(3, "incoming/b.txt".into()).await.unwrap();
        server.rmdir(4, "incoming".into()).await.unwrap();
        assert!(!dir.path().join("incoming").exists());
    }

    #[tokio::test]
    async fn test_realpath_resolves_against_root() {
        let dir = TempDir::new().unwrap();
        let mut server = server(&dir);

        let name = server.realpath(1, ".".into()).await.unwrap();
        let expected = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(name.files[0].filename, expected.to_string_lossy());
    }

    #[tokio::test]
    async fn test_setstat_truncates() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("big"), b"0123456789").unwrap();
        let mut server = server(&dir);

        let attrs = FileAttributes {
            size: Some(4),
            ..FileAttributes::default()
        };
        server.setstat(1, "big".into(), attrs).await.unwrap();
        assert_eq!(std::fs::read(dir.path().join("big")).unwrap(), b"0123");
    }
}
