//! JNI entry points

use std::ffi::c_void;

use jni::objects::JObject;
use jni::sys::{jint, jstring, JNI_ERR, JNI_VERSION_1_6};
use jni::{JNIEnv, JavaVM, NativeMethod};

use crate::{GREETING, HOST_CLASS, SAY_HELLO, SAY_HELLO_DESCRIPTOR};

/// `external fun sayHello(): String` on the host activity
#[no_mangle]
#[allow(non_snake_case)]
pub extern "system" fn Java_com_devfigas_rustjni_sample_MainActivity_sayHello(
    env: JNIEnv,
    _this: JObject,
) -> jstring {
    match env.new_string(GREETING) {
        Ok(s) => s.into_raw(),
        Err(e) => {
            log::error!("sayHello: cannot create Java string: {:?}", e);
            std::ptr::null_mut()
        }
    }
}

/// Runs once when `System.loadLibrary` maps this library into a JVM
#[no_mangle]
#[allow(non_snake_case)]
pub extern "system" fn JNI_OnLoad(vm: JavaVM, _reserved: *mut c_void) -> jint {
    crate::logging::init();

    let mut env = match vm.get_env() {
        Ok(env) => env,
        Err(e) => {
            log::error!("JNI_OnLoad: no JNIEnv for this thread: {:?}", e);
            return JNI_ERR;
        }
    };

    let methods = [NativeMethod {
        name: SAY_HELLO.into(),
        sig: SAY_HELLO_DESCRIPTOR.into(),
        fn_ptr: Java_com_devfigas_rustjni_sample_MainActivity_sayHello as *mut c_void,
    }];

    // A host without the sample class still resolves Java_ names lazily
    if let Err(e) = env.register_native_methods(HOST_CLASS, &methods) {
        let _ = env.exception_clear();
        log::warn!("RegisterNatives on {} failed: {:?}", HOST_CLASS, e);
    } else {
        log::info!("registered {} natives on {}", methods.len(), HOST_CLASS);
    }

    JNI_VERSION_1_6
}
