//! SMACK policy backend.
//!
//! Each application gets a base label `App:<id>` and one sub-label per path
//! type. Access rules are kept in a per-application rule file and loaded
//! into the kernel through `smackfs`; paths are labelled with extended
//! attributes.

use std::ffi::CString;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info};

use super::MacBackend;
use crate::backends::{BACKEND_TARGET, BackendError};
use crate::context::{Context, PathType};

/// Mount point of the SMACK filesystem.
pub const SMACKFS: &str = "/sys/fs/smackfs";

const LOAD_FILE: &str = "load2";
const SYSTEM_LABEL: &str = "System";
const SHARED_LABEL: &str = "System:Shared";
const FULL_ACCESS: &str = "rwxatl";
const REVOKE: &str = "-";

const XATTR_ACCESS: &str = "security.SMACK64";
const XATTR_EXEC: &str = "security.SMACK64EXEC";
const XATTR_TRANSMUTE: &str = "security.SMACK64TRANSMUTE";

/// Whether the running kernel enforces SMACK.
#[must_use]
pub fn is_available() -> bool {
    Utf8Path::new(SMACKFS).join(LOAD_FILE).exists()
}

/// Sets extended attributes on files.
pub trait XattrWriter {
    /// Sets attribute `name` of `path` to `value` without following links.
    ///
    /// # Errors
    ///
    /// Returns the system error.
    fn set(&self, path: &Utf8Path, name: &str, value: &[u8]) -> io::Result<()>;
}

/// [`XattrWriter`] calling `lsetxattr(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemXattrs;

impl XattrWriter for SystemXattrs {
    fn set(&self, path: &Utf8Path, name: &str, value: &[u8]) -> io::Result<()> {
        let c_path = CString::new(path.as_std_path().as_os_str().as_bytes())
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidInput, error))?;
        let c_name =
            CString::new(name).map_err(|error| io::Error::new(io::ErrorKind::InvalidInput, error))?;
        // SAFETY: both strings are NUL-terminated and outlive the call; the
        // value pointer and length describe a live slice.
        let status = unsafe {
            libc::lsetxattr(
                c_path.as_ptr(),
                c_name.as_ptr(),
                value.as_ptr().cast(),
                value.len(),
                0,
            )
        };
        if status == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

/// One `subject object access` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Rule {
    subject: String,
    object: String,
    access: String,
}

impl Rule {
    fn new(subject: impl Into<String>, object: impl Into<String>, access: &str) -> Self {
        Self {
            subject: subject.into(),
            object: object.into(),
            access: access.to_owned(),
        }
    }

    fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let rule = Self::new(words.next()?, words.next()?, words.next()?);
        words.next().is_none().then_some(rule)
    }

    fn line(&self, access: &str) -> String {
        format!("{} {} {}\n", self.subject, self.object, access)
    }
}

/// SMACK implementation of [`MacBackend`].
pub struct SmackMac {
    rules_dir: Utf8PathBuf,
    smackfs: Utf8PathBuf,
    xattrs: Box<dyn XattrWriter>,
}

impl SmackMac {
    /// Creates a backend storing rule files in `rules_dir`.
    #[must_use]
    pub fn new(rules_dir: Utf8PathBuf) -> Self {
        Self {
            rules_dir,
            smackfs: Utf8PathBuf::from(SMACKFS),
            xattrs: Box::new(SystemXattrs),
        }
    }

    /// Loads rules through `smackfs` mounted at `smackfs`.
    #[must_use]
    pub fn with_smackfs(mut self, smackfs: impl Into<Utf8PathBuf>) -> Self {
        self.smackfs = smackfs.into();
        self
    }

    /// Labels paths through `xattrs`.
    #[must_use]
    pub fn with_xattr_writer(mut self, xattrs: Box<dyn XattrWriter>) -> Self {
        self.xattrs = xattrs;
        self
    }

    /// Label of a path of type `kind` owned by application `app_id`.
    #[must_use]
    pub fn path_label(app_id: &str, kind: PathType) -> String {
        match kind {
            PathType::Default => format!("App:{app_id}"),
            PathType::Public => SHARED_LABEL.to_owned(),
            PathType::Conf => format!("App:{app_id}:Conf"),
            PathType::Data => format!("App:{app_id}:Data"),
            PathType::Exec => format!("App:{app_id}:Exec"),
            PathType::Http => format!("App:{app_id}:Http"),
            PathType::Icon => format!("App:{app_id}:Icon"),
            PathType::Id => format!("App:{app_id}:Id"),
            PathType::Lib => format!("App:{app_id}:Lib"),
            PathType::Plug => format!("App:{app_id}:Plug"),
        }
    }

    fn rule_file(&self, app_id: &str) -> Utf8PathBuf {
        self.rules_dir.join(format!("app-{app_id}"))
    }

    fn rules_for(&self, app_id: &str, context: &Context) -> Vec<Rule> {
        let app = self.derive_label(app_id);
        let mut rules = vec![
            Rule::new(SYSTEM_LABEL, app.clone(), FULL_ACCESS),
            Rule::new(app.clone(), SYSTEM_LABEL, "wx"),
            Rule::new(app.clone(), SHARED_LABEL, "rx"),
        ];
        for kind in [
            PathType::Conf,
            PathType::Data,
            PathType::Exec,
            PathType::Http,
            PathType::Icon,
            PathType::Id,
            PathType::Lib,
            PathType::Plug,
        ] {
            let object = Self::path_label(app_id, kind);
            rules.push(Rule::new(app.clone(), object.clone(), FULL_ACCESS));
            rules.push(Rule::new(SYSTEM_LABEL, object, FULL_ACCESS));
        }
        let plug = Self::path_label(app_id, PathType::Plug);
        for imported in context.plugs() {
            rules.push(Rule::new(
                self.derive_label(&imported.import_id),
                plug.clone(),
                FULL_ACCESS,
            ));
        }
        rules
    }

    fn write_rule_file(&self, path: &Utf8Path, rules: &[Rule]) -> Result<(), BackendError> {
        fs::create_dir_all(&self.rules_dir)
            .map_err(|source| BackendError::filesystem("create", &self.rules_dir, source))?;
        let content: String = rules.iter().map(|rule| rule.line(&rule.access)).collect();
        fs::write(path, content).map_err(|source| BackendError::filesystem("write", path, source))
    }

    fn read_rule_file(path: &Utf8Path) -> Result<Option<Vec<Rule>>, BackendError> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(content.lines().filter_map(Rule::parse).collect())),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(BackendError::filesystem("read", path, source)),
        }
    }

    /// Writes `rules` to the kernel, with `access` overriding each rule's own
    /// access when given. Skipped when smackfs is not mounted.
    fn push_rules(&self, rules: &[Rule], access: Option<&str>) -> Result<(), BackendError> {
        let load = self.smackfs.join(LOAD_FILE);
        if !load.exists() {
            debug!(target: BACKEND_TARGET, path = %load, "smackfs not mounted; rules not loaded");
            return Ok(());
        }
        let mut file = OpenOptions::new()
            .write(true)
            .open(&load)
            .map_err(|source| BackendError::filesystem("open", &load, source))?;
        for rule in rules {
            file.write_all(rule.line(access.unwrap_or(&rule.access)).as_bytes())
                .map_err(|source| BackendError::filesystem("write", &load, source))?;
        }
        Ok(())
    }

    fn label_paths(&self, app_id: &str, context: &Context) -> Result<(), BackendError> {
        let app = self.derive_label(app_id);
        for entry in context.paths() {
            let label = Self::path_label(app_id, entry.kind);
            self.set_xattr(&entry.path, XATTR_ACCESS, label.as_bytes())?;
            if entry.kind == PathType::Exec && entry.path.is_file() {
                self.set_xattr(&entry.path, XATTR_EXEC, app.as_bytes())?;
            }
            if entry.path.is_dir() {
                self.set_xattr(&entry.path, XATTR_TRANSMUTE, b"TRUE")?;
            }
        }
        let plug = Self::path_label(app_id, PathType::Plug);
        for exported in context.plugs() {
            self.set_xattr(&exported.export_dir, XATTR_ACCESS, plug.as_bytes())?;
            self.set_xattr(&exported.export_dir, XATTR_TRANSMUTE, b"TRUE")?;
        }
        Ok(())
    }

    fn set_xattr(&self, path: &Utf8Path, name: &str, value: &[u8]) -> Result<(), BackendError> {
        self.xattrs
            .set(path, name, value)
            .map_err(|source| BackendError::filesystem("label", path, source))
    }
}

impl MacBackend for SmackMac {
    fn name(&self) -> &'static str {
        "smack"
    }

    fn derive_label(&self, app_id: &str) -> String {
        format!("App:{app_id}")
    }

    fn install(&self, context: &Context) -> Result<(), BackendError> {
        let Some(id) = context.id() else {
            debug!(
                target: BACKEND_TARGET,
                paths = context.paths().len(),
                "no application id; nothing labelled"
            );
            return Ok(());
        };
        let rules = self.rules_for(id, context);
        let rule_file = self.rule_file(id);
        self.write_rule_file(&rule_file, &rules)?;
        self.push_rules(&rules, None)?;
        self.label_paths(id, context)?;
        info!(
            target: BACKEND_TARGET,
            id,
            rules = rules.len(),
            file = %rule_file,
            "smack policy installed"
        );
        Ok(())
    }

    fn uninstall(&self, context: &Context) -> Result<(), BackendError> {
        let Some(id) = context.id() else {
            debug!(target: BACKEND_TARGET, "no application id; nothing to remove");
            return Ok(());
        };
        let rule_file = self.rule_file(id);
        let Some(rules) = Self::read_rule_file(&rule_file)? else {
            debug!(target: BACKEND_TARGET, id, "no smack rules to remove");
            return Ok(());
        };
        self.push_rules(&rules, Some(REVOKE))?;
        fs::remove_file(&rule_file)
            .map_err(|source| BackendError::filesystem("remove", &rule_file, source))?;
        info!(target: BACKEND_TARGET, id, "smack policy removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use rstest::{fixture, rstest};
    use strum::IntoEnumIterator;
    use tempfile::TempDir;

    use super::*;

    type Calls = Rc<RefCell<Vec<(String, String, Vec<u8>)>>>;

    struct RecordingXattrs(Calls);

    impl XattrWriter for RecordingXattrs {
        fn set(&self, path: &Utf8Path, name: &str, value: &[u8]) -> io::Result<()> {
            self.0
                .borrow_mut()
                .push((path.to_string(), name.to_owned(), value.to_vec()));
            Ok(())
        }
    }

    struct Harness {
        dir: TempDir,
        calls: Calls,
        backend: SmackMac,
    }

    impl Harness {
        fn root(&self) -> Utf8PathBuf {
            Utf8PathBuf::from_path_buf(self.dir.path().to_path_buf()).expect("utf8 path")
        }

        fn loaded(&self) -> String {
            fs::read_to_string(self.root().join("smackfs").join(LOAD_FILE)).expect("read load2")
        }
    }

    #[fixture]
    fn harness() -> Harness {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 path");
        fs::create_dir(root.join("smackfs")).expect("smackfs dir");
        fs::write(root.join("smackfs").join(LOAD_FILE), b"").expect("load2");
        let calls = Calls::default();
        let backend = SmackMac::new(root.join("rules"))
            .with_smackfs(root.join("smackfs"))
            .with_xattr_writer(Box::new(RecordingXattrs(Rc::clone(&calls))));
        Harness {
            dir,
            calls,
            backend,
        }
    }

    #[test]
    fn every_path_type_has_a_label() {
        for kind in PathType::iter() {
            let label = SmackMac::path_label("demo", kind);
            match kind {
                PathType::Public => assert_eq!(label, "System:Shared"),
                PathType::Default => assert_eq!(label, "App:demo"),
                _ => assert!(label.starts_with("App:demo:"), "{label}"),
            }
        }
    }

    #[rstest]
    fn install_writes_loads_and_labels(harness: Harness) {
        let root = harness.root();
        let exec = root.join("app.bin");
        fs::write(&exec, b"#!").expect("exec file");
        let data = root.join("data");
        fs::create_dir(&data).expect("data dir");
        let export = root.join("export");
        fs::create_dir(&export).expect("export dir");

        let mut context = Context::new();
        context.set_id("demo").expect("id");
        context.add_path(exec.as_str(), PathType::Exec).expect("exec");
        context.add_path(data.as_str(), PathType::Data).expect("data");
        context
            .add_plug(export.as_str(), "consumer", data.as_str())
            .expect("plug");

        harness.backend.install(&context).expect("install");

        let rule_file = fs::read_to_string(root.join("rules").join("app-demo")).expect("rules");
        assert!(rule_file.contains("System App:demo rwxatl\n"));
        assert!(rule_file.contains("App:consumer App:demo:Plug rwxatl\n"));
        assert_eq!(harness.loaded(), rule_file);

        let calls = harness.calls.borrow();
        assert!(calls.contains(&(
            exec.to_string(),
            XATTR_ACCESS.to_owned(),
            b"App:demo:Exec".to_vec()
        )));
        assert!(calls.contains(&(exec.to_string(), XATTR_EXEC.to_owned(), b"App:demo".to_vec())));
        assert!(calls.contains(&(data.to_string(), XATTR_TRANSMUTE.to_owned(), b"TRUE".to_vec())));
        assert!(calls.contains(&(
            export.to_string(),
            XATTR_ACCESS.to_owned(),
            b"App:demo:Plug".to_vec()
        )));
    }

    #[rstest]
    fn uninstall_revokes_and_removes_rules(harness: Harness) {
        let mut context = Context::new();
        context.set_id("demo").expect("id");
        harness.backend.install(&context).expect("install");
        let installed = harness.loaded();
        fs::write(harness.root().join("smackfs").join(LOAD_FILE), b"").expect("reset load2");

        harness.backend.uninstall(&context).expect("uninstall");

        assert!(!harness.root().join("rules").join("app-demo").exists());
        let revoked = harness.loaded();
        assert!(revoked.starts_with("System App:demo -\n"), "{revoked}");
        assert_eq!(revoked.lines().count(), installed.lines().count());
    }

    #[rstest]
    fn anonymous_context_leaves_system_untouched(harness: Harness) {
        let shared = harness.root().join("shared");
        fs::create_dir(&shared).expect("shared dir");
        let mut context = Context::new();
        context
            .add_path(shared.as_str(), PathType::Default)
            .expect("default path");

        harness.backend.install(&context).expect("install");
        harness.backend.uninstall(&context).expect("uninstall");

        assert!(harness.calls.borrow().is_empty());
        assert!(harness.loaded().is_empty());
        assert!(!harness.root().join("rules").exists());
    }

    #[rstest]
    fn uninstall_without_rules_succeeds(harness: Harness) {
        let mut context = Context::new();
        context.set_id("never-installed").expect("id");
        harness.backend.uninstall(&context).expect("uninstall");
    }
}
