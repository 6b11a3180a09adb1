//! FUSE device file
//!
//! Presents the device session as a tiny filesystem:
//!
//! ```text
//! <mount>/
//! ├── crypto0   rw-rw-rw-  write a command, read the latest result
//! └── status    r--r--r--  "connected shift=13 buffered=5"
//! ```
//!
//! Mounting attaches the session (`init`) and unmounting detaches it
//! (`destroy`). Files are opened with direct I/O so the kernel neither
//! caches results nor truncates reads to a stale size. Each write is one
//! whole command regardless of the file offset.

use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::consts::FOPEN_DIRECT_IO;
use fuser::{
    FileAttr as FuserAttr, FileType as FuserFileType, Filesystem, KernelConfig, ReplyAttr,
    ReplyData, ReplyDirectory, ReplyEntry, ReplyWrite, Request,
};
use tracing::{debug, error, info, trace, warn};

use cryptdev_core::{DeviceError, STATUS_FILE_NAME};

use crate::adapter::IoAdapter;

/// TTL for FUSE kernel attribute cache
const TTL: Duration = Duration::from_secs(0);

pub const ROOT_INO: u64 = 1;
pub const DEVICE_INO: u64 = 2;
pub const STATUS_INO: u64 = 3;

/// File handle used for status opens; device handles come from the adapter
const STATUS_FH: u64 = 0;

/// Device filesystem
pub struct CryptoFS {
    adapter: Arc<IoAdapter>,
    device_name: String,
    uid: u32,
    gid: u32,
    mounted_at: SystemTime,
}

impl CryptoFS {
    pub fn new(adapter: Arc<IoAdapter>, device_name: impl Into<String>) -> Self {
        Self {
            adapter,
            device_name: device_name.into(),
            uid: 0,
            gid: 0,
            mounted_at: SystemTime::now(),
        }
    }

    pub fn adapter(&self) -> &Arc<IoAdapter> {
        &self.adapter
    }

    fn lookup_ino(&self, parent: u64, name: &OsStr) -> Option<u64> {
        if parent != ROOT_INO {
            return None;
        }
        match name.to_str()? {
            n if n == self.device_name => Some(DEVICE_INO),
            STATUS_FILE_NAME => Some(STATUS_INO),
            _ => None,
        }
    }

    fn status_bytes(&self) -> Vec<u8> {
        format!("{}\n", self.adapter.session().status()).into_bytes()
    }

    fn attr(&self, ino: u64) -> Option<FuserAttr> {
        let (kind, perm, size, nlink) = match ino {
            ROOT_INO => (FuserFileType::Directory, 0o755, 0, 2),
            DEVICE_INO => (
                FuserFileType::RegularFile,
                0o666,
                self.adapter.session().buffered_len() as u64,
                1,
            ),
            STATUS_INO => (
                FuserFileType::RegularFile,
                0o444,
                self.status_bytes().len() as u64,
                1,
            ),
            _ => return None,
        };

        Some(FuserAttr {
            ino,
            size,
            blocks: size.div_ceil(512),
            atime: self.mounted_at,
            mtime: self.mounted_at,
            ctime: self.mounted_at,
            crtime: UNIX_EPOCH,
            kind,
            perm,
            nlink,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: 512,
            flags: 0,
        })
    }
}

/// Slice `data` the way a positional read would
fn slice_at(data: &[u8], offset: i64, size: u32) -> &[u8] {
    let start = usize::try_from(offset).unwrap_or(0).min(data.len());
    let end = start.saturating_add(size as usize).min(data.len());
    &data[start..end]
}

impl Filesystem for CryptoFS {
    fn init(&mut self, req: &Request<'_>, config: &mut KernelConfig) -> Result<(), libc::c_int> {
        self.uid = req.uid();
        self.gid = req.gid();

        let max_write = self.adapter.max_command_len() as u32;
        if let Err(nearest) = config.set_max_write(max_write) {
            warn!(
                "kernel max_write {} is below the command limit {}; larger commands will be split",
                nearest, max_write
            );
        }

        match self.adapter.session().attach() {
            Ok(generation) => {
                info!("Device {} ready (generation {})", self.device_name, generation);
                Ok(())
            }
            Err(e) => {
                error!("attach failed: {}", e);
                Err(e.to_errno())
            }
        }
    }

    fn destroy(&mut self) {
        match self.adapter.session().detach() {
            Ok(()) => info!("Device {} removed", self.device_name),
            Err(e) => debug!("destroy: {}", e),
        }
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        trace!("lookup: parent={}, name={:?}", parent, name);
        match self.lookup_ino(parent, name).and_then(|ino| self.attr(ino)) {
            Some(attr) => reply.entry(&TTL, &attr, 0),
            None => reply.error(libc::ENOENT),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        trace!("getattr: ino={}", ino);
        match self.attr(ino) {
            Some(attr) => reply.attr(&TTL, &attr),
            None => reply.error(libc::ENOENT),
        }
    }

    /// Accept truncation from shell redirection; nothing else is settable
    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<fuser::TimeOrNow>,
        _mtime: Option<fuser::TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        debug!("setattr: ino={}, size={:?}", ino, size);
        if ino != DEVICE_INO || mode.is_some() || uid.is_some() || gid.is_some() {
            reply.error(libc::EPERM);
            return;
        }
        match self.attr(ino) {
            Some(attr) => reply.attr(&TTL, &attr),
            None => reply.error(libc::ENOENT),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: fuser::ReplyOpen) {
        trace!("open: ino={}, flags={:#x}", ino, flags);
        match ino {
            DEVICE_INO => match self.adapter.open() {
                Ok(fh) => reply.opened(fh, FOPEN_DIRECT_IO),
                Err(e) => {
                    warn!("open rejected: {}", e);
                    reply.error(e.to_errno());
                }
            },
            STATUS_INO if flags & libc::O_ACCMODE == libc::O_RDONLY => {
                reply.opened(STATUS_FH, FOPEN_DIRECT_IO)
            }
            STATUS_INO => reply.error(libc::EACCES),
            ROOT_INO => reply.error(libc::EISDIR),
            _ => reply.error(libc::ENOENT),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        trace!("read: ino={}, fh={}, offset={}, size={}", ino, fh, offset, size);
        match ino {
            DEVICE_INO => {
                let offset = u64::try_from(offset).unwrap_or(0);
                match self.adapter.read_at(fh, offset, size as usize) {
                    Ok(data) => reply.data(&data),
                    Err(e) => {
                        debug!("read error: {}", e);
                        reply.error(e.to_errno());
                    }
                }
            }
            STATUS_INO => reply.data(slice_at(&self.status_bytes(), offset, size)),
            _ => reply.error(libc::ENOENT),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        debug!("write: ino={}, fh={}, offset={}, size={}", ino, fh, offset, data.len());
        if ino != DEVICE_INO {
            reply.error(libc::EACCES);
            return;
        }

        match self.adapter.write(fh, data) {
            Ok(written) => reply.written(written as u32),
            Err(e) => {
                warn!("write rejected: {}", e);
                reply.error(e.to_errno());
            }
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: fuser::ReplyEmpty,
    ) {
        trace!("release: ino={}, fh={}", ino, fh);
        if ino == DEVICE_INO {
            if let Err(DeviceError::BadHandle(fh)) = self.adapter.release(fh) {
                debug!("release: unknown handle {}", fh);
            }
        }
        reply.ok();
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        debug!("readdir: ino={}, offset={}", ino, offset);
        if ino != ROOT_INO {
            reply.error(libc::ENOTDIR);
            return;
        }

        let entries = [
            (ROOT_INO, FuserFileType::Directory, "."),
            (ROOT_INO, FuserFileType::Directory, ".."),
            (DEVICE_INO, FuserFileType::RegularFile, self.device_name.as_str()),
            (STATUS_INO, FuserFileType::RegularFile, STATUS_FILE_NAME),
        ];
        let skip = usize::try_from(offset).unwrap_or(0);
        for (i, (entry_ino, kind, name)) in entries.iter().enumerate().skip(skip) {
            if reply.add(*entry_ino, (i + 1) as i64, *kind, name) {
                break;
            }
        }
        reply.ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::DeviceSession;

    fn fs() -> CryptoFS {
        let session = Arc::new(DeviceSession::default());
        session.attach().unwrap();
        CryptoFS::new(Arc::new(IoAdapter::new(session)), "crypto0")
    }

    #[test]
    fn test_lookup_names() {
        let fs = fs();
        assert_eq!(fs.lookup_ino(ROOT_INO, OsStr::new("crypto0")), Some(DEVICE_INO));
        assert_eq!(fs.lookup_ino(ROOT_INO, OsStr::new("status")), Some(STATUS_INO));
        assert_eq!(fs.lookup_ino(ROOT_INO, OsStr::new("crypto1")), None);
        assert_eq!(fs.lookup_ino(DEVICE_INO, OsStr::new("crypto0")), None);
    }

    #[test]
    fn test_device_attr_tracks_buffer() {
        let fs = fs();
        let attr = fs.attr(DEVICE_INO).unwrap();
        assert!(matches!(attr.kind, FuserFileType::RegularFile));
        assert_eq!(attr.perm, 0o666);
        assert_eq!(attr.size, 0);

        fs.adapter().submit(b"E:hello").unwrap();
        assert_eq!(fs.attr(DEVICE_INO).unwrap().size, 5);
    }

    #[test]
    fn test_root_and_unknown_attr() {
        let fs = fs();
        let root = fs.attr(ROOT_INO).unwrap();
        assert!(matches!(root.kind, FuserFileType::Directory));
        assert!(fs.attr(42).is_none());
    }

    #[test]
    fn test_status_file_contents() {
        let fs = fs();
        assert_eq!(fs.status_bytes(), b"connected shift=13 buffered=0\n");
        assert_eq!(fs.attr(STATUS_INO).unwrap().perm, 0o444);

        fs.adapter().session().detach().unwrap();
        assert_eq!(fs.status_bytes(), b"disconnected\n");
    }

    #[test]
    fn test_slice_at() {
        let data = b"connected";
        assert_eq!(slice_at(data, 0, 4), b"conn");
        assert_eq!(slice_at(data, 5, 100), b"cted");
        assert_eq!(slice_at(data, 9, 4), b"");
        assert_eq!(slice_at(data, 50, 4), b"");
        assert_eq!(slice_at(data, -1, 4), b"conn");
    }
}
