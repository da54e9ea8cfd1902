//! gitbridge - pluggable config and refdb backends for a native core.
//!
//! This is the entry point for the gitbridge shell. It exports an
//! in-memory configuration backend and an in-memory refdb as native
//! operation tables, then drives every command through the table slots
//! exactly the way the native core would call them.

use std::ffi::{c_char, c_int, CStr, CString};
use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::ptr;

use gitbridge::config::{self, ConfigLevel, MemoryConfigBackend};
use gitbridge::raw::codes;
use gitbridge::raw::config::{RawConfigBackend, RawConfigIterator};
use gitbridge::raw::refdb::{
    RawOid, RawRefdbBackend, RawReference, RawReferenceIterator, REFERENCE_DIRECT,
    REFERENCE_SYMBOLIC,
};
use gitbridge::raw::{
    config_entry_dispose, last_error, reference_dispose, take_last_error, RawConfigEntry,
};
use gitbridge::refdb::{self, MemoryRefdb};
use gitbridge::types::ObjectId;
use gitbridge::version::Version;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    // Parse simple command line args.
    let mut verbose = false;
    let mut execute: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-e" | "--execute" => {
                i += 1;
                if i < args.len() {
                    execute = Some(args[i].clone());
                }
            }
            "-v" | "--verbose" => {
                verbose = true;
            }
            "-h" | "--help" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            "--version" => {
                println!("{}", Version::current());
                return ExitCode::SUCCESS;
            }
            arg => {
                eprintln!("Unknown option: {}", arg);
                return ExitCode::FAILURE;
            }
        }
        i += 1;
    }

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if verbose {
            tracing::Level::TRACE
        } else {
            tracing::Level::WARN
        })
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let mut shell = Shell::new();

    // Execute a command script or run interactively.
    if let Some(script) = execute {
        for command in script.split(';') {
            let command = command.trim();
            if command.is_empty() {
                continue;
            }
            match shell.execute(command) {
                Ok(true) => break,
                Ok(false) => {}
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
        ExitCode::SUCCESS
    } else {
        match shell.run() {
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        }
    }
}

fn print_help() {
    println!("gitbridge - config and refdb backends behind native operation tables");
    println!();
    println!("Usage: gitbridge [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -e, --execute CMDS     Run ';'-separated shell commands and exit");
    println!("  -v, --verbose          Enable dispatch tracing");
    println!("  -h, --help             Show this help message");
    println!("  --version              Show version and table revisions");
    println!();
    println!("Examples:");
    println!("  gitbridge                                   Start the interactive shell");
    println!("  gitbridge -e 'set user.name alice; entries' Run two commands and exit");
}

/// The interactive shell.
///
/// Owns two exported operation tables and calls through their slots; the
/// backing instances live in the handle registry until the tables are
/// freed on drop.
struct Shell {
    cfg: *mut RawConfigBackend,
    refs: *mut RawRefdbBackend,
    history: Vec<String>,
}

impl Shell {
    fn new() -> Self {
        Self {
            cfg: config::export_backend(MemoryConfigBackend::new(ConfigLevel::Local)),
            refs: refdb::export_backend(MemoryRefdb::new()),
            history: Vec::new(),
        }
    }

    /// Run the shell interactively.
    fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.print_banner();

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            print!("bridge> ");
            stdout.flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                // EOF.
                println!("\nGoodbye!");
                break;
            }

            let command = line.trim().to_string();
            if command.is_empty() {
                continue;
            }
            self.history.push(command.clone());

            match self.execute(&command) {
                Ok(true) => break,
                Ok(false) => {}
                Err(e) => eprintln!("Error: {}", e),
            }
        }

        Ok(())
    }

    fn print_banner(&self) {
        println!("╔════════════════════════════════════════════════════╗");
        println!("║                 gitbridge v0.1.0                   ║");
        println!("║     backend tables for config and references       ║");
        println!("╠════════════════════════════════════════════════════╣");
        println!("║  Type help for commands, quit to exit              ║");
        println!("╚════════════════════════════════════════════════════╝");
        println!();
    }

    /// Run one command. `Ok(true)` means the shell should exit.
    fn execute(&mut self, input: &str) -> Result<bool, String> {
        let parts: Vec<&str> = input.split_whitespace().collect();
        let Some(&command) = parts.first() else {
            return Ok(false);
        };

        match command {
            "help" | "h" | "?" => self.print_command_help(),
            "quit" | "exit" | "q" => return Ok(true),
            "version" => println!("{}", Version::current()),
            "history" => {
                for (i, cmd) in self.history.iter().enumerate() {
                    println!("  {}: {}", i + 1, cmd);
                }
            }
            "error" => match last_error() {
                Some(err) => println!("{:?}: {}", err.category, err.message),
                None => println!("(no error recorded)"),
            },

            // Configuration commands.
            "set" => match &parts[1..] {
                &[key, value] => {
                    self.cfg_set(key, value)?;
                    println!("ok");
                }
                _ => eprintln!("Usage: set <key> <value>"),
            },
            "get" => match &parts[1..] {
                &[key] => self.cfg_get(key)?,
                _ => eprintln!("Usage: get <key>"),
            },
            "del" => match &parts[1..] {
                &[key] => {
                    self.cfg_del(key)?;
                    println!("ok");
                }
                _ => eprintln!("Usage: del <key>"),
            },
            "add" => match &parts[1..] {
                &[name, value] => {
                    // a pattern that never matches appends a fresh value
                    self.cfg_set_multivar(name, "$^", value)?;
                    println!("ok");
                }
                _ => eprintln!("Usage: add <name> <value>"),
            },
            "replace-all" => match &parts[1..] {
                &[name, pattern, value] => {
                    self.cfg_set_multivar(name, pattern, value)?;
                    println!("ok");
                }
                _ => eprintln!("Usage: replace-all <name> <pattern> <value>"),
            },
            "unset-all" => match &parts[1..] {
                &[name, pattern] => {
                    self.cfg_del_multivar(name, pattern)?;
                    println!("ok");
                }
                _ => eprintln!("Usage: unset-all <name> <pattern>"),
            },
            "entries" => {
                let count = list_config_entries(self.cfg)?;
                println!("({} entries)", count);
            }
            "snapshot" => self.cfg_snapshot()?,
            "lock" => {
                self.cfg_lock()?;
                println!("locked; writes are staged until unlock");
            }
            "unlock" => self.cfg_unlock()?,

            // Reference commands.
            "ref-set" => match &parts[1..] {
                &[name, hex] => {
                    self.ref_set(name, hex, false)?;
                    println!("ok");
                }
                &[name, hex, "--force"] => {
                    self.ref_set(name, hex, true)?;
                    println!("ok");
                }
                _ => eprintln!("Usage: ref-set <name> <40-hex-oid> [--force]"),
            },
            "ref-link" => match &parts[1..] {
                &[name, target] => {
                    self.ref_link(name, target, false)?;
                    println!("ok");
                }
                &[name, target, "--force"] => {
                    self.ref_link(name, target, true)?;
                    println!("ok");
                }
                _ => eprintln!("Usage: ref-link <name> <target> [--force]"),
            },
            "ref-del" => match &parts[1..] {
                &[name] => {
                    self.ref_del(name)?;
                    println!("ok");
                }
                _ => eprintln!("Usage: ref-del <name>"),
            },
            "ref-rename" => match &parts[1..] {
                &[old, new] => self.ref_rename(old, new, false)?,
                &[old, new, "--force"] => self.ref_rename(old, new, true)?,
                _ => eprintln!("Usage: ref-rename <old> <new> [--force]"),
            },
            "refs" => match &parts[1..] {
                &[] => self.refs_list(None)?,
                &[glob] => self.refs_list(Some(glob))?,
                _ => eprintln!("Usage: refs [glob]"),
            },
            "ref-names" => match &parts[1..] {
                &[] => self.ref_names(None)?,
                &[glob] => self.ref_names(Some(glob))?,
                _ => eprintln!("Usage: ref-names [glob]"),
            },
            "lookup" => match &parts[1..] {
                &[name] => self.ref_lookup(name)?,
                _ => eprintln!("Usage: lookup <name>"),
            },
            "compress" => {
                self.ref_compress()?;
                println!("ok");
            }

            other => {
                eprintln!("Unknown command: {}", other);
                eprintln!("Type help for available commands");
            }
        }

        Ok(false)
    }

    fn print_command_help(&self) {
        println!("Configuration (through the config table):");
        println!("  set <key> <value>                    Store a single-valued key");
        println!("  get <key>                            Read a key");
        println!("  del <key>                            Delete a key");
        println!("  add <name> <value>                   Append a multi-valued entry");
        println!("  replace-all <name> <pattern> <value> Replace matching values");
        println!("  unset-all <name> <pattern>           Delete matching values");
        println!("  entries                              List all entries");
        println!("  snapshot                             List a frozen snapshot");
        println!("  lock / unlock                        Stage writes, then commit");
        println!();
        println!("References (through the refdb table):");
        println!("  ref-set <name> <oid> [--force]       Write a direct reference");
        println!("  ref-link <name> <target> [--force]   Write a symbolic reference");
        println!("  ref-del <name>                       Delete a reference");
        println!("  ref-rename <old> <new> [--force]     Rename a reference");
        println!("  refs [glob]                          List references");
        println!("  ref-names [glob]                     List reference names");
        println!("  lookup <name>                        Look up one reference");
        println!("  compress                             Ask the backend to compact");
        println!();
        println!("Shell:");
        println!("  error                                Show the last recorded error");
        println!("  history                              Show command history");
        println!("  version                              Show version and table revisions");
        println!("  help, quit");
    }

    fn cfg_set(&mut self, key: &str, value: &str) -> Result<(), String> {
        let set = unsafe { (*self.cfg).set }.ok_or("set is not supported")?;
        let key = c_string(key)?;
        let value = c_string(value)?;
        check(unsafe { set(self.cfg, key.as_ptr(), value.as_ptr()) })
    }

    fn cfg_get(&self, key: &str) -> Result<(), String> {
        let get = unsafe { (*self.cfg).get }.ok_or("get is not supported")?;
        let key = c_string(key)?;
        let mut entry = RawConfigEntry::zeroed();
        let code = unsafe { get(self.cfg, key.as_ptr(), &mut entry) };
        if code == codes::ENOTFOUND {
            println!("(not set)");
            return Ok(());
        }
        check(code)?;
        unsafe {
            print_config_entry(&entry);
            config_entry_dispose(&mut entry);
        }
        Ok(())
    }

    fn cfg_del(&mut self, key: &str) -> Result<(), String> {
        let del = unsafe { (*self.cfg).del }.ok_or("del is not supported")?;
        let key = c_string(key)?;
        check(unsafe { del(self.cfg, key.as_ptr()) })
    }

    fn cfg_set_multivar(&mut self, name: &str, pattern: &str, value: &str) -> Result<(), String> {
        let set_multivar =
            unsafe { (*self.cfg).set_multivar }.ok_or("set_multivar is not supported")?;
        let name = c_string(name)?;
        let pattern = c_string(pattern)?;
        let value = c_string(value)?;
        check(unsafe {
            set_multivar(self.cfg, name.as_ptr(), pattern.as_ptr(), value.as_ptr())
        })
    }

    fn cfg_del_multivar(&mut self, name: &str, pattern: &str) -> Result<(), String> {
        let del_multivar =
            unsafe { (*self.cfg).del_multivar }.ok_or("del_multivar is not supported")?;
        let name = c_string(name)?;
        let pattern = c_string(pattern)?;
        check(unsafe { del_multivar(self.cfg, name.as_ptr(), pattern.as_ptr()) })
    }

    fn cfg_snapshot(&self) -> Result<(), String> {
        let snapshot = unsafe { (*self.cfg).snapshot }.ok_or("snapshot is not supported")?;
        let mut frozen: *mut RawConfigBackend = ptr::null_mut();
        check(unsafe { snapshot(&mut frozen, self.cfg) })?;

        // free the snapshot table even when listing fails
        let listed = list_config_entries(frozen);
        if let Some(free) = unsafe { (*frozen).free } {
            unsafe { free(frozen) };
        }
        println!("({} entries in snapshot)", listed?);
        Ok(())
    }

    fn cfg_lock(&mut self) -> Result<(), String> {
        let lock = unsafe { (*self.cfg).lock }.ok_or("lock is not supported")?;
        check(unsafe { lock(self.cfg) })
    }

    fn cfg_unlock(&mut self) -> Result<(), String> {
        let unlock = unsafe { (*self.cfg).unlock }.ok_or("unlock is not supported")?;
        let mut committed: c_int = 0;
        check(unsafe { unlock(self.cfg, &mut committed) })?;
        if committed != 0 {
            println!("staged changes committed");
        } else {
            println!("nothing to commit");
        }
        Ok(())
    }

    fn ref_set(&mut self, name: &str, hex: &str, force: bool) -> Result<(), String> {
        let write = unsafe { (*self.refs).write }.ok_or("write is not supported")?;
        let id = ObjectId::from_hex(hex).map_err(|e| e.to_string())?;
        let name = c_string(name)?;
        let raw = RawReference {
            name: name.as_ptr() as *mut c_char,
            kind: REFERENCE_DIRECT,
            oid: RawOid::from(&id),
            symbolic: ptr::null_mut(),
        };
        check(unsafe {
            write(
                self.refs,
                &raw,
                c_int::from(force),
                ptr::null(),
                ptr::null(),
                ptr::null(),
                ptr::null(),
            )
        })
    }

    fn ref_link(&mut self, name: &str, target: &str, force: bool) -> Result<(), String> {
        let write = unsafe { (*self.refs).write }.ok_or("write is not supported")?;
        let name = c_string(name)?;
        let target = c_string(target)?;
        let raw = RawReference {
            name: name.as_ptr() as *mut c_char,
            kind: REFERENCE_SYMBOLIC,
            oid: RawOid::zero(),
            symbolic: target.as_ptr() as *mut c_char,
        };
        check(unsafe {
            write(
                self.refs,
                &raw,
                c_int::from(force),
                ptr::null(),
                ptr::null(),
                ptr::null(),
                ptr::null(),
            )
        })
    }

    fn ref_del(&mut self, name: &str) -> Result<(), String> {
        let del = unsafe { (*self.refs).del }.ok_or("del is not supported")?;
        let name = c_string(name)?;
        check(unsafe { del(self.refs, name.as_ptr(), ptr::null(), ptr::null()) })
    }

    fn ref_rename(&mut self, old: &str, new: &str, force: bool) -> Result<(), String> {
        let rename = unsafe { (*self.refs).rename }.ok_or("rename is not supported")?;
        let old = c_string(old)?;
        let new = c_string(new)?;
        let mut out: *mut RawReference = ptr::null_mut();
        check(unsafe {
            rename(
                &mut out,
                self.refs,
                old.as_ptr(),
                new.as_ptr(),
                c_int::from(force),
                ptr::null(),
                ptr::null(),
            )
        })?;
        unsafe {
            print_reference(out);
            reference_dispose(out);
        }
        Ok(())
    }

    fn ref_lookup(&self, name: &str) -> Result<(), String> {
        let lookup = unsafe { (*self.refs).lookup }.ok_or("lookup is not supported")?;
        let name = c_string(name)?;
        let mut out: *mut RawReference = ptr::null_mut();
        let code = unsafe { lookup(&mut out, self.refs, name.as_ptr()) };
        if code == codes::ENOTFOUND {
            println!("(not found)");
            return Ok(());
        }
        check(code)?;
        unsafe {
            print_reference(out);
            reference_dispose(out);
        }
        Ok(())
    }

    fn refs_list(&self, glob: Option<&str>) -> Result<(), String> {
        let make_iter = unsafe { (*self.refs).iterator }.ok_or("iterator is not supported")?;
        let glob = glob.map(c_string).transpose()?;
        let mut iter: *mut RawReferenceIterator = ptr::null_mut();
        check(unsafe {
            make_iter(
                &mut iter,
                self.refs,
                glob.as_ref().map_or(ptr::null(), |g| g.as_ptr()),
            )
        })?;

        let next = unsafe { (*iter).next }.ok_or("iterator table is missing next")?;
        let free = unsafe { (*iter).free };
        let mut count = 0usize;
        let result = loop {
            let mut out: *mut RawReference = ptr::null_mut();
            let code = unsafe { next(&mut out, iter) };
            if code == codes::ITEROVER {
                break Ok(count);
            }
            if code != codes::OK {
                break Err(describe(code));
            }
            unsafe {
                print_reference(out);
                reference_dispose(out);
            }
            count += 1;
        };
        if let Some(free) = free {
            unsafe { free(iter) };
        }
        println!("({} references)", result?);
        Ok(())
    }

    fn ref_names(&self, glob: Option<&str>) -> Result<(), String> {
        let make_iter = unsafe { (*self.refs).iterator }.ok_or("iterator is not supported")?;
        let glob = glob.map(c_string).transpose()?;
        let mut iter: *mut RawReferenceIterator = ptr::null_mut();
        check(unsafe {
            make_iter(
                &mut iter,
                self.refs,
                glob.as_ref().map_or(ptr::null(), |g| g.as_ptr()),
            )
        })?;

        let next_name = unsafe { (*iter).next_name }.ok_or("iterator table is missing next_name")?;
        let free = unsafe { (*iter).free };
        let mut count = 0usize;
        let result = loop {
            let mut out: *const c_char = ptr::null();
            let code = unsafe { next_name(&mut out, iter) };
            if code == codes::ITEROVER {
                break Ok(count);
            }
            if code != codes::OK {
                break Err(describe(code));
            }
            // the name is scratch owned by the iterator; valid until the
            // next call, so print it before advancing
            println!("{}", unsafe { CStr::from_ptr(out) }.to_string_lossy());
            count += 1;
        };
        if let Some(free) = free {
            unsafe { free(iter) };
        }
        println!("({} names)", result?);
        Ok(())
    }

    fn ref_compress(&mut self) -> Result<(), String> {
        let compress = unsafe { (*self.refs).compress }.ok_or("compress is not supported")?;
        check(unsafe { compress(self.refs) })
    }
}

impl Drop for Shell {
    fn drop(&mut self) {
        unsafe {
            if let Some(free) = (*self.cfg).free {
                free(self.cfg);
            }
            if let Some(free) = (*self.refs).free {
                free(self.refs);
            }
        }
    }
}

/// Iterate a config table and print every entry. Shared by `entries`
/// (the live table) and `snapshot` (a frozen one).
fn list_config_entries(table: *mut RawConfigBackend) -> Result<usize, String> {
    let make_iter = unsafe { (*table).iterator }.ok_or("iterator is not supported")?;
    let mut iter: *mut RawConfigIterator = ptr::null_mut();
    check(unsafe { make_iter(&mut iter, table) })?;

    let next = unsafe { (*iter).next }.ok_or("iterator table is missing next")?;
    let free = unsafe { (*iter).free };
    let mut count = 0usize;
    let result = loop {
        let mut entry = RawConfigEntry::zeroed();
        let code = unsafe { next(&mut entry, iter) };
        if code == codes::ITEROVER {
            break Ok(count);
        }
        if code != codes::OK {
            break Err(describe(code));
        }
        unsafe {
            print_config_entry(&entry);
            config_entry_dispose(&mut entry);
        }
        count += 1;
    };
    if let Some(free) = free {
        unsafe { free(iter) };
    }
    result
}

/// # Safety
/// The entry's name and value pointers must be valid NUL-terminated strings.
unsafe fn print_config_entry(entry: &RawConfigEntry) {
    let name = CStr::from_ptr(entry.name).to_string_lossy();
    let value = CStr::from_ptr(entry.value).to_string_lossy();
    let level = ConfigLevel::from_raw(entry.level)
        .map(|level| level.to_string())
        .unwrap_or_else(|| format!("level {}", entry.level));
    println!("{} = {}  [{}]", name, value, level);
}

/// # Safety
/// `raw` must point at a reference record produced by a table slot.
unsafe fn print_reference(raw: *const RawReference) {
    let name = CStr::from_ptr((*raw).name).to_string_lossy();
    if (*raw).kind == REFERENCE_SYMBOLIC {
        let target = CStr::from_ptr((*raw).symbolic).to_string_lossy();
        println!("{} -> {}", name, target);
    } else {
        println!("{} {}", (*raw).oid.to_object_id(), name);
    }
}

fn c_string(s: &str) -> Result<CString, String> {
    CString::new(s).map_err(|_| "argument contains an interior NUL byte".to_string())
}

/// Map a non-OK return to the out-of-band error detail.
fn check(code: c_int) -> Result<(), String> {
    if code == codes::OK {
        Ok(())
    } else {
        Err(describe(code))
    }
}

fn describe(code: c_int) -> String {
    match take_last_error() {
        Some(err) => format!("{} (code {})", err.message, code),
        None => format!("code {}", code),
    }
}
