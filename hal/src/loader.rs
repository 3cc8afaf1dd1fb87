//! # Program Loader
//!
//! Creates and releases the per-process resources the kernel cannot build
//! itself: the program image, the user stack, and the register context that
//! starts execution at the image entry point.

use crate::{CpuContext, VirtAddr};

/// Image loader abstraction
pub trait ImageLoader: Send + Sync {
    /// Loaded program image handle
    type Image;

    /// Allocated stack handle
    type Stack;

    /// Context type produced for new processes
    type Context: CpuContext;

    /// Load a program by name, returning the image and its entry point
    ///
    /// Returns `None` when the program does not exist or cannot be loaded.
    fn create_image(&self, program: &str) -> Option<(Self::Image, VirtAddr)>;

    /// Release an image created by [`ImageLoader::create_image`]
    fn release_image(&self, image: Self::Image);

    /// Allocate a user stack of `size` bytes
    fn create_stack(&self, size: usize) -> Self::Stack;

    /// Release a stack created by [`ImageLoader::create_stack`]
    fn release_stack(&self, stack: Self::Stack);

    /// Build the context that begins execution at `entry` on `stack`
    fn initial_context(
        &self,
        image: &Self::Image,
        stack: &Self::Stack,
        stack_size: usize,
        entry: VirtAddr,
    ) -> Self::Context;
}
