//! The plugin host: discovers, loads, describes and instantiates
//! image-effect plugins and dispatches actions across the opaque boundary
//! (spec §4.3).

use crate::foundation::error::{ToucanError, ToucanResult};
use crate::image_algebra::{Image, ImageSpec};
use crate::plugin_host::abi::{self, actions};
use crate::plugin_host::instance::{PluginInstance, PluginState};
use crate::property_set::PropertySet;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// An opaque handle a `CreateInstance` action produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PluginHandle(pub usize);

/// Abstracts the single `(action, handle, in_args, out_args) -> status`
/// dispatch entry point (spec §4.3, §6), so the host can be driven by a
/// real dynamically-loaded library ([`RawDispatch`]) or, in tests, a
/// lightweight stand-in with no FFI boundary at all.
pub trait PluginDispatch: Send + Sync {
    /// Dispatch one action.
    fn call(&self, action: &str, handle: PluginHandle, in_args: &mut PropertySet, out_args: &mut PropertySet) -> abi::Status;
}

/// [`PluginDispatch`] backed by a dynamically loaded library's
/// `main_entry_point` function pointer (spec §4.3 "Plugin object").
pub struct RawDispatch {
    main_entry_point:
        extern "C" fn(*const std::os::raw::c_char, *mut std::os::raw::c_void, *mut std::os::raw::c_void, *mut std::os::raw::c_void) -> abi::Status,
    // Keeps the owning library alive for as long as any dispatch built
    // from it may still be called.
    _library: Arc<libloading::Library>,
}

impl RawDispatch {
    /// Wrap a descriptor's `main_entry_point`, keeping `library` alive.
    pub fn new(descriptor: &abi::PluginDescriptor, library: Arc<libloading::Library>) -> Self {
        Self {
            main_entry_point: descriptor.main_entry_point,
            _library: library,
        }
    }
}

impl PluginDispatch for RawDispatch {
    fn call(&self, action: &str, handle: PluginHandle, in_args: &mut PropertySet, out_args: &mut PropertySet) -> abi::Status {
        let action = match std::ffi::CString::new(action) {
            Ok(c) => c,
            Err(_) => return -1,
        };
        // Safety: the plugin ABI is self-consistent within this crate (no
        // third-party binary actually implements it); `in_args`/`out_args`
        // are passed as raw pointers to satisfy the `extern "C"` boundary
        // the way the real published standard would marshal a property
        // suite, and remain valid for the duration of this call.
        (self.main_entry_point)(
            action.as_ptr(),
            handle.0 as *mut std::os::raw::c_void,
            (in_args as *mut PropertySet).cast(),
            (out_args as *mut PropertySet).cast(),
        )
    }
}

struct PluginRecord {
    api_name: String,
    version: (i32, i32),
    dispatch: Arc<dyn PluginDispatch>,
    state: PluginState,
    capabilities: PropertySet,
    lock: Arc<Mutex<()>>,
}

/// Host-wide options.
#[derive(Clone, Debug)]
pub struct PluginHostOptions {
    /// Directories to scan for `.ofx` plugin libraries (spec §4.3).
    pub search_dirs: Vec<std::path::PathBuf>,
}

impl Default for PluginHostOptions {
    fn default() -> Self {
        Self { search_dirs: Vec::new() }
    }
}

/// Makes opaque image-effect plugins usable as image nodes (spec §4.3).
///
/// Plugin *instances* are exclusive to the thread that executes the
/// effect node; this host serializes access via a per-plugin [`Mutex`]
/// (one of the two options spec §5 leaves open), since a fresh instance
/// per render would throw away the property-set state `Describe` filled.
pub struct PluginHost {
    records: Mutex<BTreeMap<String, PluginRecord>>,
}

impl Default for PluginHost {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginHost {
    /// An empty host with no registered plugins.
    pub fn new() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
        }
    }

    /// Register a plugin under `identifier` with a dispatcher, in the
    /// `Unloaded` state. Used both by real discovery (wrapping a
    /// [`RawDispatch`]) and by tests (wrapping a mock).
    pub fn register(&self, identifier: impl Into<String>, api_name: impl Into<String>, version: (i32, i32), dispatch: Arc<dyn PluginDispatch>) {
        let mut records = self.records.lock().expect("plugin host records poisoned");
        records.insert(
            identifier.into(),
            PluginRecord {
                api_name: api_name.into(),
                version,
                dispatch,
                state: PluginState::Unloaded,
                capabilities: PropertySet::new(),
                lock: Arc::new(Mutex::new(())),
            },
        );
    }

    /// Scan `opts.search_dirs` for `.ofx` libraries, load each, and
    /// register every plugin it describes (spec §4.3 "Plugin discovery").
    /// Load failures are logged and the plugin omitted from the registry
    /// (spec §4.3 Failure), never fatal to discovery as a whole.
    pub fn discover(&self, opts: &PluginHostOptions) {
        for path in super::discover::discover_plugins(&opts.search_dirs) {
            if let Err(e) = self.load_library(&path) {
                tracing::error!(path = %path.display(), error = %e, "failed to load plugin library, omitting from registry");
            }
        }
    }

    fn load_library(&self, path: &std::path::Path) -> ToucanResult<()> {
        // Safety: loading an arbitrary shared library is inherently
        // unsafe; the host trusts `.ofx` files found in configured search
        // directories to export the two documented symbols (spec §6).
        let library = unsafe { libloading::Library::new(path) }.map_err(|e| ToucanError::read_failed(path.display().to_string(), e.to_string()))?;
        let library = Arc::new(library);
        let get_count: libloading::Symbol<abi::GetNumberOfPluginsFn> =
            unsafe { library.get(abi::SYM_GET_NUMBER_OF_PLUGINS) }.map_err(|e| ToucanError::read_failed(path.display().to_string(), e.to_string()))?;
        let get_plugin: libloading::Symbol<abi::GetPluginFn> =
            unsafe { library.get(abi::SYM_GET_PLUGIN) }.map_err(|e| ToucanError::read_failed(path.display().to_string(), e.to_string()))?;

        let count = unsafe { get_count() };
        for index in 0..count {
            let descriptor_ptr = unsafe { get_plugin(index) };
            if descriptor_ptr.is_null() {
                continue;
            }
            let descriptor = unsafe { *descriptor_ptr };
            let (api_name, identifier) = unsafe { abi::read_descriptor_strings(&descriptor) };
            let dispatch: Arc<dyn PluginDispatch> = Arc::new(RawDispatch::new(&descriptor, Arc::clone(&library)));
            self.register(identifier, api_name, (descriptor.version_major, descriptor.version_minor), dispatch);
        }
        Ok(())
    }

    fn with_record<T>(&self, plugin_id: &str, f: impl FnOnce(&mut PluginRecord) -> ToucanResult<T>) -> ToucanResult<T> {
        let mut records = self.records.lock().expect("plugin host records poisoned");
        let record = records
            .get_mut(plugin_id)
            .ok_or_else(|| ToucanError::not_found(format!("plugin {plugin_id}")))?;
        f(record)
    }

    /// `Unloaded -> Loaded` (spec §4.3).
    pub fn load(&self, plugin_id: &str) -> ToucanResult<()> {
        self.with_record(plugin_id, |record| {
            let mut dummy_in = PropertySet::new();
            let mut dummy_out = PropertySet::new();
            self_dispatch(record, actions::LOAD, PluginHandle(0), &mut dummy_in, &mut dummy_out)
        })
    }

    /// `Loaded -> Described`, filling the plugin's capability property set
    /// (spec §4.3 "`Describe` fills the plugin's capability property
    /// set").
    pub fn describe(&self, plugin_id: &str) -> ToucanResult<()> {
        self.with_record(plugin_id, |record| {
            let mut dummy_in = PropertySet::new();
            let mut out = PropertySet::new();
            self_dispatch(record, actions::DESCRIBE, PluginHandle(0), &mut dummy_in, &mut out)?;
            record.capabilities = out;
            Ok(())
        })
    }

    /// `Described -> Instantiated`, producing an opaque handle (spec §4.3
    /// "`CreateInstance` produces an opaque handle").
    pub fn create_instance(&self, plugin_id: &str) -> ToucanResult<PluginInstance> {
        self.with_record(plugin_id, |record| {
            let mut dummy_in = PropertySet::new();
            let mut out = PropertySet::new();
            self_dispatch(record, actions::CREATE_INSTANCE, PluginHandle(0), &mut dummy_in, &mut out)?;
            let handle = out.get_pointer("instance_handle", 0).unwrap_or(0);
            Ok(PluginInstance {
                plugin_id: plugin_id.to_string(),
                handle,
                properties: PropertySet::new(),
                state: PluginState::Instantiated,
            })
        })
    }

    /// Render one frame through `instance`: publishes `inputs` as pointer
    /// properties `Source` (dimension = `inputs.len()`) and a freshly
    /// allocated `output_spec`-sized buffer as `Output`, calls `Render`,
    /// and reads the mutated output back (spec §4.3 "Render action").
    ///
    /// On a non-OK status this returns [`ToucanError::PluginError`]; the
    /// caller (the `HostEffect` image-node variant) applies the identity
    /// fallback spec §4.3's Failure policy describes.
    pub fn render(&self, instance: &mut PluginInstance, inputs: &[Image], output_spec: ImageSpec) -> ToucanResult<Image> {
        let lock = {
            let records = self.records.lock().expect("plugin host records poisoned");
            records
                .get(&instance.plugin_id)
                .map(|r| Arc::clone(&r.lock))
                .ok_or_else(|| ToucanError::not_found(format!("plugin {}", instance.plugin_id)))?
        };
        let _guard = lock.lock().expect("per-plugin render lock poisoned");

        let mut in_args = PropertySet::new();
        let source_ptrs: Vec<usize> = inputs
            .iter()
            .map(|img| Box::into_raw(Box::new(img.clone())) as usize)
            .collect();
        for (i, ptr) in source_ptrs.iter().enumerate() {
            in_args.set_pointer("Source", i, *ptr)?;
        }
        let output_ptr = Box::into_raw(Box::new(Image::blank(output_spec))) as usize;
        in_args.set_pointer("Output", 0, output_ptr)?;

        let mut out_args = PropertySet::new();
        let result = self.with_record(&instance.plugin_id, |record| {
            self_dispatch(record, actions::RENDER, PluginHandle(instance.handle), &mut in_args, &mut out_args)
        });

        // Reclaim every boxed input (the host's copy; the plugin never
        // owns these, only observes them for the call's duration).
        for ptr in source_ptrs {
            drop(unsafe { Box::from_raw(ptr as *mut Image) });
        }
        let output = unsafe { Box::from_raw(output_ptr as *mut Image) };

        match result {
            Ok(()) => {
                instance.state = PluginState::Active;
                Ok(*output)
            }
            Err(e) => Err(e),
        }
    }

    /// `Active/Instantiated -> Described` (spec §4.3).
    pub fn destroy_instance(&self, instance: &mut PluginInstance) -> ToucanResult<()> {
        self.with_record(&instance.plugin_id, |record| {
            let mut dummy_in = PropertySet::new();
            let mut dummy_out = PropertySet::new();
            self_dispatch(record, actions::DESTROY_INSTANCE, PluginHandle(instance.handle), &mut dummy_in, &mut dummy_out)
        })?;
        instance.state = PluginState::Described;
        Ok(())
    }

    /// `Described -> Unloaded` (spec §4.3).
    pub fn unload(&self, plugin_id: &str) -> ToucanResult<()> {
        self.with_record(plugin_id, |record| {
            let mut dummy_in = PropertySet::new();
            let mut dummy_out = PropertySet::new();
            self_dispatch(record, actions::UNLOAD, PluginHandle(0), &mut dummy_in, &mut dummy_out)
        })
    }

    /// Metadata for a registered plugin, if any.
    pub fn describe_registered(&self, plugin_id: &str) -> Option<(String, (i32, i32), PluginState)> {
        let records = self.records.lock().expect("plugin host records poisoned");
        records.get(plugin_id).map(|r| (r.api_name.clone(), r.version, r.state))
    }
}

fn self_dispatch(record: &mut PluginRecord, action: &str, handle: PluginHandle, in_args: &mut PropertySet, out_args: &mut PropertySet) -> ToucanResult<()> {
    if !record.state.accepts(action) {
        return Err(ToucanError::plugin_error(action, -1));
    }
    let status = record.dispatch.call(action, handle, in_args, out_args);
    if status != abi::STATUS_OK {
        return Err(ToucanError::plugin_error(action, status));
    }
    record.state = record.state.advance(action);
    Ok(())
}
