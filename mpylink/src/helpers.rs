//! Device-side MicroPython helper snippets and the VFS mount agent.
//!
//! These are plain text assets, installed on the device by executing
//! their source through the REPL engine. They are not generated at
//! runtime beyond substituting the small numeric parameters each
//! snippet documents.

/// Attribute bit MicroPython's `os.stat` reports for a regular file.
pub const ATTR_FILE: u32 = 0x8000;
/// Attribute bit MicroPython's `os.stat` reports for a directory.
pub const ATTR_DIR: u32 = 0x4000;

/// `_mpylink_stat(path)`: `None` if missing, `-1` for a directory, else
/// the file size.
pub const STAT: &str = r#"
def _mpylink_stat(path):
    try:
        res = os.stat(path)
        if res[0] == 0x4000:
            return -1
        if res[0] == 0x8000:
            return res[6]
    except:
        return None
    return None
"#;

/// `_mpylink_tree(path)`: recursive `(path, total_size, children)`.
pub const TREE: &str = r#"
def _mpylink_tree(path):
    res_dir = []
    res_file = []
    dir_size = 0
    for entry in os.ilistdir(path):
        name, attr = entry[:2]
        if attr == 0x8000:
            size = entry[3]
            res_file.append((name, size, None))
            dir_size += size
        elif attr == 0x4000:
            sub_path = path + name if path in ('', '/') else path + '/' + name
            _sub_path, sub_dir_size, sub_tree = _mpylink_tree(sub_path)
            res_dir.append((name, sub_dir_size, sub_tree))
            dir_size += sub_dir_size
    return path, dir_size, res_dir + res_file
"#;

/// `_mpylink_mkdir(path)`: recursive, idempotent. Returns `True` if a
/// non-directory blocked the path.
pub const MKDIR: &str = r#"
def _mpylink_mkdir(path):
    path = path.rstrip('/')
    check_path = ''
    found = True
    for dir_part in path.split('/'):
        if check_path:
            check_path += '/'
        check_path += dir_part
        if found:
            try:
                result = os.stat(check_path)
                if result[0] == 0x8000:
                    return True
                continue
            except:
                found = False
        os.mkdir(check_path)
    return False
"#;

/// `_mpylink_rmdir(path)`: recursive file+directory delete.
pub const RMDIR: &str = r#"
def _mpylink_rmdir(path):
    for name, attr, _inode, _size in os.ilistdir(path):
        if attr == 0x8000:
            os.remove(path + '/' + name)
        elif attr == 0x4000:
            _mpylink_rmdir(path + '/' + name)
    os.rmdir(path)
"#;

/// `_mpylink_fileinfo(paths)`: batched existence + conditional hash.
/// `paths` is a list of `(path, expected_size)`; returns a parallel list
/// where each entry is `None` (missing or a directory) or
/// `(size, hash_hex)`, with the hash only computed when the reported
/// size equals the caller's expectation.
pub const FILEINFO: &str = r#"
def _mpylink_fileinfo(paths):
    import uhashlib
    out = []
    for path, expected_size in paths:
        try:
            st = os.stat(path)
        except:
            out.append(None)
            continue
        if st[0] != 0x8000:
            out.append(None)
            continue
        size = st[6]
        if size != expected_size:
            out.append((size, ''))
            continue
        h = uhashlib.sha256()
        with open(path, 'rb') as f:
            while True:
                chunk = f.read(1024)
                if not chunk:
                    break
                h.update(chunk)
        import ubinascii
        out.append((size, ubinascii.hexlify(h.digest()).decode()))
    return out
"#;

/// `_mpylink_hashfile(path)`: SHA-256 hex digest, or `None` if
/// unsupported or missing.
pub const HASHFILE: &str = r#"
def _mpylink_hashfile(path):
    try:
        import uhashlib, ubinascii
        h = uhashlib.sha256()
        with open(path, 'rb') as f:
            while True:
                chunk = f.read(1024)
                if not chunk:
                    break
                h.update(chunk)
        return ubinascii.hexlify(h.digest()).decode()
    except:
        return None
"#;

/// `_mpylink_chunk_probe()`: largest safe upload chunk given current
/// free memory.
pub const CHUNK_PROBE: &str = r#"
def _mpylink_chunk_probe():
    import gc
    gc.collect()
    free = gc.mem_free()
    for size in (32768, 16384, 8192, 4096, 2048, 1024, 512):
        if free > size * 4:
            return size
    return 512
"#;

/// `_mpylink_deflate_probe()`: `True` if a deflate decompressor is
/// importable.
pub const DEFLATE_PROBE: &str = r#"
def _mpylink_deflate_probe():
    try:
        import deflate
        return True
    except ImportError:
        return False
"#;

/// Source template for the device-side VFS mount agent. `{chunk_size}`
/// and `{mount_point}` are substituted before injection; `{mid}` binds
/// the agent instance to a router mount id so multiple mounts can
/// coexist on one device.
pub const MOUNT_AGENT_TEMPLATE: &str = r#"
import sys, io, os, micropython, struct as _mt_S
_mt_si = sys.stdin.buffer
_mt_so = sys.stdout.buffer
_mt_E = 0x18
def _mt_bg(cmd, mid):
    micropython.kbd_intr(-1)
    _mt_so.write(bytes([_mt_E, cmd, mid]))
    while _mt_si.read(1)[0] != _mt_E:
        pass
def _mt_en():
    micropython.kbd_intr(3)
def _mt_r(fmt):
    return _mt_S.unpack(fmt, _mt_si.read(_mt_S.calcsize(fmt)))[0]
def _mt_w(fmt, v):
    _mt_so.write(_mt_S.pack(fmt, v))
def _mt_rs():
    n = _mt_r('<i')
    return _mt_si.read(n).decode() if n > 0 else ''
def _mt_ws(v):
    b = v.encode()
    _mt_w('<i', len(b))
    if b:
        _mt_so.write(b)
def _mt_rbi(buf, n):
    mv = memoryview(buf)
    p = 0
    while p < n:
        r = _mt_si.readinto(mv[p:n])
        if r:
            p += r
class _mt_RF(io.IOBase):
    def __init__(s, fd, mid, txt):
        s.fd = fd
        s.mid = mid
        s.txt = txt
        s._rb = bytearray({chunk_size})
        s._rn = 0
        s._rp = 0
    def _refill(s):
        _mt_bg(5, s.mid)
        _mt_w('b', s.fd)
        _mt_w('<i', {chunk_size})
        n = _mt_r('<i')
        if n > 0:
            _mt_rbi(s._rb, n)
        _mt_en()
        s._rn = n
        s._rp = 0
    def readinto(s, buf):
        n = len(buf)
        if n >= {chunk_size}:
            _mt_bg(5, s.mid)
            _mt_w('b', s.fd)
            _mt_w('<i', n)
            g = _mt_r('<i')
            if g > 0:
                _mt_rbi(buf, g)
            _mt_en()
            return g if g > 0 else 0
        if s._rp >= s._rn:
            s._refill()
            if s._rn <= 0:
                return 0
        a = min(n, s._rn - s._rp)
        buf[:a] = s._rb[s._rp:s._rp + a]
        s._rp += a
        return a
    def read(s, n=-1):
        if n > 0:
            b = bytearray(n)
            d = bytes(b[:s.readinto(b)])
        else:
            p = []
            b = bytearray({chunk_size})
            while True:
                g = s.readinto(b)
                if g <= 0:
                    break
                p.append(bytes(b[:g]))
            d = b''.join(p)
        return str(d, 'utf8') if s.txt else d
    def write(s, data):
        _mt_bg(6, s.mid)
        _mt_w('b', s.fd)
        _mt_w('<i', len(data))
        _mt_so.write(data)
        err = _mt_r('b')
        _mt_en()
        if err < 0:
            raise OSError(-err)
        return len(data)
    def close(s):
        if s.fd >= 0:
            _mt_bg(4, s.mid)
            _mt_w('b', s.fd)
            _mt_en()
            s.fd = -1
class _mt_FS:
    def __init__(s, mid):
        s.mid = mid
        s._cwd = '/'
    def mount(s, ro, mkfs):
        pass
    def umount(s):
        pass
    def chdir(s, p):
        if p.startswith('/'):
            s._cwd = p
        elif p == '..':
            s._cwd = '/'.join(s._cwd.rstrip('/').split('/')[:-1]) or '/'
        else:
            s._cwd = s._cwd.rstrip('/') + '/' + p
    def getcwd(s):
        return s._cwd
    def _abs(s, p):
        if not p or p == '.':
            return s._cwd
        if p.startswith('/'):
            return p
        return s._cwd.rstrip('/') + '/' + p
    def stat(s, p):
        _mt_bg(1, s.mid)
        _mt_ws(s._abs(p))
        r = _mt_r('b')
        if r < 0:
            _mt_en()
            raise OSError(-r)
        m = _mt_r('<I')
        sz = _mt_r('<I')
        mt = _mt_r('<I')
        _mt_en()
        return (m, 0, 0, 0, 0, 0, sz, mt, mt, mt)
    def ilistdir(s, p):
        _mt_bg(2, s.mid)
        _mt_ws(s._abs(p))
        n = _mt_r('<i')
        if n < 0:
            _mt_en()
            raise OSError(-n)
        entries = []
        for _ in range(n):
            entries.append((_mt_rs(), _mt_r('<I'), 0))
        _mt_en()
        for e in entries:
            yield e
    def open(s, p, mode):
        _mt_bg(3, s.mid)
        _mt_ws(s._abs(p))
        _mt_ws(mode)
        fd = _mt_r('b')
        _mt_en()
        if fd < 0:
            raise OSError(-fd)
        if 'w' in mode or 'a' in mode or '+' in mode:
            return _mt_RF(fd, s.mid, 'b' not in mode)
        return _mt_RF(fd, s.mid, 'b' not in mode)
    def mkdir(s, p):
        _mt_bg(7, s.mid)
        _mt_ws(s._abs(p))
        err = _mt_r('b')
        _mt_en()
        if err < 0:
            raise OSError(-err)
    def remove(s, p):
        s._remove(p, 0)
    def rmdir(s, p):
        s._remove(p, 1)
    def _remove(s, p, recursive):
        _mt_bg(8, s.mid)
        _mt_ws(s._abs(p))
        _mt_w('b', recursive)
        err = _mt_r('b')
        _mt_en()
        if err < 0:
            raise OSError(-err)
def _mt_mount_{mid}():
    mp = '{mount_point}'
    try:
        os.umount(mp)
    except:
        pass
    os.mount(_mt_FS({mid}), mp)
"#;
