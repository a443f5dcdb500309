//! Integration tests for embedded import semantics
//!
//! Drives the importer with a stub host whose "bytecode" is the source text
//! prefixed with `BC:`. Lines of the form `import <name>` trigger nested
//! imports through the import context; `raise <msg>` fails evaluation.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use vela_importer::{
    EmbeddedImporter, Host, HostError, ImportChain, ImportContext, ImportError,
};
use vela_resources::{
    CollectorConfig, FinalizedCollection, Origin, Policy, RawResource, ResourceCollector,
};

#[derive(Debug)]
struct StubModule {
    name: String,
    is_package: bool,
}

#[derive(Default)]
struct StubHost {
    compiles: AtomicUsize,
    executions: Mutex<Vec<String>>,
    reentry_same_object: AtomicBool,
    eval_delay: Option<Duration>,
}

impl StubHost {
    fn with_delay(delay: Duration) -> Self {
        Self {
            eval_delay: Some(delay),
            ..Self::default()
        }
    }

    fn execution_count(&self, name: &str) -> usize {
        self.executions.lock().iter().filter(|n| *n == name).count()
    }
}

impl Host for StubHost {
    type Module = StubModule;

    fn new_module(&self, name: &str, is_package: bool) -> StubModule {
        StubModule {
            name: name.to_string(),
            is_package,
        }
    }

    fn compile(&self, _name: &str, source: &[u8]) -> Result<Vec<u8>, HostError> {
        if source == b"<corrupt>" {
            return Err(HostError::Corrupt("not decodable as source".to_string()));
        }
        self.compiles.fetch_add(1, Ordering::SeqCst);
        Ok([b"BC:".as_slice(), source].concat())
    }

    fn evaluate(
        &self,
        ctx: &dyn ImportContext<StubModule>,
        module: &StubModule,
        bytecode: &[u8],
    ) -> Result<(), HostError> {
        if let Some(delay) = self.eval_delay {
            std::thread::sleep(delay);
        }

        let text = String::from_utf8_lossy(bytecode);
        let text = text.strip_prefix("BC:").unwrap_or(&text);
        for line in text.lines() {
            if let Some(target) = line.strip_prefix("import ") {
                let inner = ctx
                    .import(target.trim())
                    .map_err(|e| HostError::Failed(Box::new(e)))?;
                if inner.name == module.name
                    && Arc::as_ptr(&inner) == module as *const StubModule
                {
                    self.reentry_same_object.store(true, Ordering::SeqCst);
                }
            } else if let Some(msg) = line.strip_prefix("raise ") {
                return Err(HostError::Failed(msg.to_string().into()));
            }
        }

        self.executions.lock().push(module.name.clone());
        Ok(())
    }
}

fn collect_in_memory(modules: &[(&str, &[u8])]) -> FinalizedCollection {
    let mut collector =
        ResourceCollector::new(CollectorConfig::new(Policy::InMemoryOnly)).unwrap();
    for (name, source) in modules {
        collector
            .add_in_memory(RawResource::source(*name, source.to_vec()))
            .unwrap();
    }
    collector.finalize().unwrap()
}

fn importer_for(modules: &[(&str, &[u8])]) -> EmbeddedImporter<StubHost> {
    let blob = collect_in_memory(modules).index.encode();
    EmbeddedImporter::load(&blob, StubHost::default(), ".").unwrap()
}

#[test]
fn test_find_and_execute_in_memory_source() {
    let importer = importer_for(&[("foo", b"import io\n"), ("io", b"")]);

    let found = importer.find("foo").unwrap();
    assert_eq!(found.name(), "foo");
    assert_eq!(found.origin(), Origin::InMemory);
    assert!(!found.is_package());

    let module = importer.execute("foo").unwrap();
    assert_eq!(module.name, "foo");
    assert_eq!(importer.host().execution_count("foo"), 1);
    // The nested `import io` resolved through the same importer.
    assert_eq!(importer.host().execution_count("io"), 1);
}

#[test]
fn test_find_miss_is_not_an_error() {
    let importer = importer_for(&[("foo", b"")]);
    assert!(importer.find("absent").is_none());

    let err = importer.execute("absent").unwrap_err();
    assert!(matches!(err, ImportError::UnknownModule(name) if name == "absent"));
}

#[test]
fn test_execute_is_cached() {
    let importer = importer_for(&[("foo", b"")]);

    let first = importer.execute("foo").unwrap();
    let second = importer.execute("foo").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(importer.host().execution_count("foo"), 1);
    assert_eq!(importer.host().compiles.load(Ordering::SeqCst), 1);
}

#[test]
fn test_bytecode_module_skips_compilation() {
    let mut collector =
        ResourceCollector::new(CollectorConfig::new(Policy::InMemoryOnly)).unwrap();
    collector
        .add_in_memory(RawResource::bytecode("precompiled", b"BC:".to_vec()))
        .unwrap();
    let blob = collector.finalize().unwrap().index.encode();

    let importer = EmbeddedImporter::load(&blob, StubHost::default(), ".").unwrap();
    importer.execute("precompiled").unwrap();
    assert_eq!(importer.host().compiles.load(Ordering::SeqCst), 0);
    assert_eq!(importer.host().execution_count("precompiled"), 1);
}

#[test]
fn test_corrupt_payload() {
    let importer = importer_for(&[("bad", b"<corrupt>")]);
    let err = importer.execute("bad").unwrap_err();
    assert!(matches!(err, ImportError::CorruptPayload { name, .. } if name == "bad"));
}

#[test]
fn test_execution_failure_propagates_and_is_not_cached() {
    let importer = importer_for(&[("boom", b"raise top-level failure\n")]);

    match importer.execute("boom") {
        Err(ImportError::Execution { name, source }) => {
            assert_eq!(name, "boom");
            assert_eq!(source.to_string(), "top-level failure");
        }
        other => panic!("expected Execution error, got {other:?}"),
    }

    // The failure left no cache entry: a second import runs again and
    // fails the same way rather than returning a half-built module.
    assert!(matches!(
        importer.execute("boom"),
        Err(ImportError::Execution { .. })
    ));
}

#[test]
fn test_missing_filesystem_payload() {
    let temp = tempfile::tempdir().unwrap();
    let mut collector =
        ResourceCollector::new(CollectorConfig::new(Policy::FilesystemRelativeOnly)).unwrap();
    collector
        .add_filesystem_relative("lib", RawResource::source("disk.mod", b"x\n".to_vec()))
        .unwrap();
    let finalized = collector.finalize().unwrap();

    // Materialize the installs the way a packaging harness would.
    for install in &finalized.installs {
        let path = temp.path().join(&install.path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, &install.data).unwrap();
    }

    let blob = finalized.index.encode();
    let importer = EmbeddedImporter::load(&blob, StubHost::default(), temp.path()).unwrap();

    let found = importer.find("disk.mod").unwrap();
    assert_eq!(found.origin(), Origin::FilesystemRelative);

    // Delete the installed file out from under the importer.
    let installed = temp.path().join("lib/disk/mod.vela");
    std::fs::remove_file(&installed).unwrap();

    let err = importer.execute("disk.mod").unwrap_err();
    assert!(matches!(err, ImportError::NotFound { ref name, .. } if name == "disk.mod"));

    // The cache entry stayed absent: restoring the file makes the same
    // import succeed.
    std::fs::write(&installed, b"x\n").unwrap();
    importer.execute("disk.mod").unwrap();
    assert_eq!(importer.host().execution_count("disk.mod"), 1);
}

#[test]
fn test_concurrent_execute_runs_once() {
    let blob = collect_in_memory(&[("slow", b"")]).index.encode();
    let importer = Arc::new(
        EmbeddedImporter::load(
            &blob,
            StubHost::with_delay(Duration::from_millis(100)),
            ".",
        )
        .unwrap(),
    );

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let importer = Arc::clone(&importer);
            std::thread::spawn(move || importer.execute("slow").unwrap())
        })
        .collect();

    let modules: Vec<Arc<StubModule>> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(Arc::ptr_eq(&modules[0], &modules[1]));
    assert_eq!(importer.host().execution_count("slow"), 1);
}

#[test]
fn test_circular_self_import_sees_executing_module() {
    let importer = importer_for(&[("cycle", b"import cycle\n")]);

    let module = importer.execute("cycle").unwrap();
    assert_eq!(module.name, "cycle");
    // The inner import observed the same, still-executing module object.
    assert!(importer.host().reentry_same_object.load(Ordering::SeqCst));
    assert_eq!(importer.host().execution_count("cycle"), 1);
}

#[test]
fn test_package_flag_reaches_module_object() {
    let mut collector =
        ResourceCollector::new(CollectorConfig::new(Policy::InMemoryOnly)).unwrap();
    collector
        .add_in_memory(RawResource::source("pkg", b"".to_vec()).into_package())
        .unwrap();
    let blob = collector.finalize().unwrap().index.encode();

    let importer = EmbeddedImporter::load(&blob, StubHost::default(), ".").unwrap();
    assert!(importer.find("pkg").unwrap().is_package());
    let module = importer.execute("pkg").unwrap();
    assert!(module.is_package);
}

#[test]
fn test_read_data() {
    let mut collector =
        ResourceCollector::new(CollectorConfig::new(Policy::InMemoryOnly)).unwrap();
    collector
        .add_in_memory(RawResource::package_data("pkg/settings.json", b"{}".to_vec()))
        .unwrap();
    let blob = collector.finalize().unwrap().index.encode();

    let importer = EmbeddedImporter::load(&blob, StubHost::default(), ".").unwrap();
    assert_eq!(
        importer.read_data("pkg/settings.json").unwrap(),
        Some(b"{}".to_vec())
    );
    assert_eq!(importer.read_data("pkg/missing.json").unwrap(), None);
}

#[test]
fn test_chain_falls_through_on_miss() {
    let first_blob = collect_in_memory(&[("first.mod", b"")]).index.encode();
    let second_blob = collect_in_memory(&[("second.mod", b"")]).index.encode();

    let mut chain = ImportChain::new();
    chain.register(Arc::new(
        EmbeddedImporter::load(&first_blob, StubHost::default(), ".").unwrap(),
    ));
    chain.register(Arc::new(
        EmbeddedImporter::load(&second_blob, StubHost::default(), ".").unwrap(),
    ));

    assert_eq!(chain.len(), 2);
    assert_eq!(chain.find("first.mod").unwrap().name(), "first.mod");
    assert_eq!(chain.find("second.mod").unwrap().name(), "second.mod");
    assert!(chain.find("third.mod").is_none());

    let module = chain.execute("second.mod").unwrap();
    assert_eq!(module.name, "second.mod");

    let err = chain.execute("third.mod").unwrap_err();
    assert!(matches!(err, ImportError::UnknownModule(_)));
}
