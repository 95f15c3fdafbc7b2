//! An unbounded pool of on-demand directories for auxiliary working trees.
//! Adapted from the generic resource-pool idiom: creating a fresh temporary
//! directory touches the filesystem, so finished ones are kept around for
//! reuse by the next acquisition rather than torn down immediately.

use std::ops::Deref;
use std::sync::Mutex;

pub trait Resource {
    type Output;
    type Error;

    fn try_create(&self) -> Result<Self::Output, Self::Error>;
}

pub struct ResourcePool<R: Resource> {
    factory: R,
    resources: Mutex<Vec<R::Output>>,
}

impl<R: Resource> ResourcePool<R> {
    pub fn new(factory: R) -> Self {
        Self {
            factory,
            resources: Mutex::new(Vec::new()),
        }
    }

    /// Returns a pooled resource if one is idle, otherwise builds a fresh one.
    pub fn try_create(&self) -> Result<ResourceHandle<'_, R>, R::Error> {
        let resource = {
            let mut resources = self.resources.lock().expect("poisoned resource pool");
            match resources.pop() {
                Some(resource) => resource,
                None => self.factory.try_create()?,
            }
        };
        Ok(ResourceHandle {
            parent: self,
            inner: Some(resource),
        })
    }
}

pub struct ResourceHandle<'pool, R: Resource> {
    parent: &'pool ResourcePool<R>,
    inner: Option<R::Output>,
}

impl<R: Resource> ResourceHandle<'_, R> {
    /// Removes the resource from pool-management entirely, e.g. because the
    /// caller is about to delete it rather than return it for reuse.
    pub fn take(mut self) -> R::Output {
        self.inner.take().expect("resource handle already taken")
    }
}

impl<R: Resource> Deref for ResourceHandle<'_, R> {
    type Target = R::Output;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref().expect("resource handle already taken")
    }
}

impl<R: Resource> Drop for ResourceHandle<'_, R> {
    fn drop(&mut self) {
        if let Some(resource) = self.inner.take() {
            let mut resources = self.parent.resources.lock().expect("poisoned resource pool");
            resources.push(resource);
        }
    }
}
