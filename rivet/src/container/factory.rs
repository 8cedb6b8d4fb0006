//! Closures whose argument types declare their dependencies

use crate::error::Error;

/// A closure that produces a value from dependencies extracted by type.
///
/// Implemented for `Fn() -> T` and for `Fn(A1, .., An) -> Result<T, Error>` with up to five
/// [`Dependency`](super::Dependency) arguments. A closure without arguments cannot fail.
pub trait GenericFactory<Args>: Send + Sync + 'static {
    /// Type of the produced value
    type Output;

    /// Number of dependencies the closure takes
    const ARITY: usize;

    /// Invokes the closure with extracted dependencies
    fn call(&self, args: Args) -> Result<Self::Output, Error>;
}

impl<F, R> GenericFactory<()> for F
where
    F: Fn() -> R + Send + Sync + 'static
{
    type Output = R;

    const ARITY: usize = 0;

    #[inline]
    fn call(&self, (): ()) -> Result<R, Error> {
        Ok(self())
    }
}

macro_rules! impl_fallible_factory {
    ($arity:literal => $($arg:ident),+) => {
        impl<F, R, $($arg),+> GenericFactory<($($arg,)+)> for F
        where
            F: Fn($($arg),+) -> Result<R, Error> + Send + Sync + 'static
        {
            type Output = R;

            const ARITY: usize = $arity;

            #[inline]
            #[allow(non_snake_case)]
            fn call(&self, ($($arg,)+): ($($arg,)+)) -> Result<R, Error> {
                self($($arg),+)
            }
        }
    };
}

impl_fallible_factory!(1 => A1);
impl_fallible_factory!(2 => A1, A2);
impl_fallible_factory!(3 => A1, A2, A3);
impl_fallible_factory!(4 => A1, A2, A3, A4);
impl_fallible_factory!(5 => A1, A2, A3, A4, A5);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Container, ContainerBuilder, Dc, Many};

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Width {
        px: u32,
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Height {
        px: u32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Area(u32);

    fn arity<A, F: GenericFactory<A>>(_: &F) -> usize {
        F::ARITY
    }

    #[test]
    fn it_reports_arity() {
        assert_eq!(arity(&|| Width { px: 1 }), 0);
        assert_eq!(arity(&|w: Dc<Width>| Ok(Area(w.px))), 1);
        assert_eq!(arity(&|w: Dc<Width>, h: Dc<Height>| Ok(Area(w.px * h.px))), 2);
    }

    #[test]
    fn it_builds_from_extracted_dependencies() {
        let mut builder = ContainerBuilder::new();
        builder.register_instance(Width { px: 3 });
        builder.register_instance(Height { px: 4 });
        builder.register_transient_factory(|w: Dc<Width>, h: Dc<Height>| Ok(Area(w.px * h.px)));

        let container = builder.build();

        assert_eq!(container.resolve::<Area>().unwrap(), Area(12));
    }

    #[test]
    fn it_builds_from_container() {
        let mut builder = ContainerBuilder::new();
        builder.register_instance(Width { px: 2 });
        builder.register_transient_factory(|c: Container| {
            let width = c.resolve::<Width>()?;
            Ok(Area(width.px * width.px))
        });

        let container = builder.build();

        assert_eq!(container.resolve::<Area>().unwrap(), Area(4));
    }

    #[test]
    fn it_builds_from_every_registration() {
        let mut builder = ContainerBuilder::new();
        builder.register_instance(Width { px: 1 });
        builder.register_instance(Width { px: 5 });
        builder.register_transient_factory(|widths: Many<Width>| {
            Ok(Area(widths.iter().map(|w| w.px).sum()))
        });

        let container = builder.build();

        assert_eq!(container.resolve::<Area>().unwrap(), Area(6));
    }

    #[test]
    fn it_propagates_factory_errors() {
        let mut builder = ContainerBuilder::new();
        builder.register_instance(Width { px: 0 });
        builder.register_transient_factory(|w: Dc<Width>| match w.px {
            0 => Err(Error::other("empty area")),
            n => Ok(Area(n)),
        });

        let container = builder.build();

        assert_eq!(container.resolve::<Area>().unwrap_err(), Error::Other("empty area".into()));
    }
}
