use darling::FromMeta;
use darling::ast::NestedMeta;
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{ToTokens, quote};
use syn::{
    FnArg, GenericArgument, ImplItem, ImplItemFn, ItemImpl, LitStr, Pat, PathArguments, ReturnType,
    Type, Visibility, parse_macro_input,
};

#[derive(Debug, FromMeta)]
struct InjectableArgs {
    #[darling(rename = "crate", default)]
    krate: Option<syn::Path>,
}

/// How a constructor parameter is read from the resolved arguments.
enum Access {
    /// Taken as `Arc<X>`: declared as `X`, passed as the shared handle.
    Shared(Type),
    /// Taken by value: declared as its own type, cloned out.
    Owned(Type),
}

struct Parameter {
    name: String,
    access: Access,
}

pub fn injectable(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = match NestedMeta::parse_meta_list(attr.into()) {
        Ok(list) => list,
        Err(e) => return darling::Error::from(e).write_errors().into(),
    };
    let args = match InjectableArgs::from_list(&args) {
        Ok(args) => args,
        Err(e) => return e.write_errors().into(),
    };

    let item = parse_macro_input!(item as ItemImpl);

    match expand(args, &item) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand(args: InjectableArgs, item: &ItemImpl) -> syn::Result<TokenStream2> {
    if let Some((_, path, _)) = &item.trait_ {
        return Err(syn::Error::new_spanned(
            path,
            "#[injectable] goes on an inherent impl block, not a trait impl",
        ));
    }

    let krate = args.krate.unwrap_or_else(|| syn::parse_quote!(::tarkib));
    let self_ty = &item.self_ty;

    let mut constructors = Vec::new();
    for member in &item.items {
        let ImplItem::Fn(method) = member else {
            continue;
        };
        if !is_constructor(method, self_ty) {
            continue;
        }
        constructors.push(constructor(method, &krate)?);
    }

    if constructors.is_empty() {
        return Err(syn::Error::new_spanned(
            self_ty,
            "#[injectable] found no `pub fn` returning `Self`",
        ));
    }

    let (impl_generics, _, where_clause) = item.generics.split_for_impl();

    // generic impls cannot be catalogued: there is no single type to describe
    let catalog = item.generics.params.is_empty().then(|| {
        quote! {
            #krate::inventory::submit! {
                #krate::catalog::InjectableType::new(
                    <#self_ty as #krate::candidate::Injectable>::descriptor,
                )
            }
        }
    });

    Ok(quote! {
        #item

        impl #impl_generics #krate::candidate::Injectable for #self_ty #where_clause {
            fn constructors() -> ::std::vec::Vec<#krate::candidate::Constructor<Self>> {
                ::std::vec![#(#constructors),*]
            }
        }

        #catalog
    })
}

fn is_constructor(method: &ImplItemFn, self_ty: &Type) -> bool {
    if !matches!(method.vis, Visibility::Public(_)) || method.sig.receiver().is_some() {
        return false;
    }

    let ReturnType::Type(_, ty) = &method.sig.output else {
        return false;
    };

    is_self(ty) || same_type(ty, self_ty)
}

fn constructor(method: &ImplItemFn, krate: &syn::Path) -> syn::Result<TokenStream2> {
    let parameters = method
        .sig
        .inputs
        .iter()
        .map(parameter)
        .collect::<syn::Result<Vec<_>>>()?;

    let name = &method.sig.ident;
    let reads = parameters.iter().enumerate().map(|(position, p)| match &p.access {
        Access::Shared(ty) => quote! { __args.arc::<#ty>(#position)? },
        Access::Owned(ty) => quote! { __args.value::<#ty>(#position)? },
    });
    let declarations = parameters.iter().map(|p| {
        let name = LitStr::new(&p.name, proc_macro2::Span::call_site());
        let ty = match &p.access {
            Access::Shared(ty) | Access::Owned(ty) => ty,
        };
        quote! { .param::<#ty>(#name) }
    });

    Ok(quote! {
        #krate::candidate::Constructor::new(|__args: &#krate::candidate::Arguments<'_>| {
            ::std::result::Result::Ok(Self::#name(#(#reads),*))
        })
        #(#declarations)*
    })
}

fn parameter(input: &FnArg) -> syn::Result<Parameter> {
    let FnArg::Typed(typed) = input else {
        return Err(syn::Error::new_spanned(input, "constructors take no receiver"));
    };

    let Pat::Ident(ident) = typed.pat.as_ref() else {
        return Err(syn::Error::new_spanned(
            &typed.pat,
            "constructor parameters must be plain identifiers",
        ));
    };

    let ty = typed.ty.as_ref();
    if matches!(ty, Type::Reference(_) | Type::ImplTrait(_)) {
        return Err(syn::Error::new_spanned(
            ty,
            "constructor parameters must be owned; take shared services as `Arc<T>`",
        ));
    }

    let access = match arc_inner(ty) {
        Some(inner) => Access::Shared(inner.clone()),
        None => Access::Owned(ty.clone()),
    };

    Ok(Parameter {
        name: ident.ident.to_string().trim_start_matches("r#").to_owned(),
        access,
    })
}

/// `X` for a type spelled `Arc<X>` (with any path prefix).
fn arc_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let last = path.path.segments.last()?;
    if last.ident != "Arc" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &last.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) if args.args.len() == 1 => Some(inner),
        _ => None,
    }
}

fn is_self(ty: &Type) -> bool {
    matches!(ty, Type::Path(path) if path.qself.is_none() && path.path.is_ident("Self"))
}

fn same_type(a: &Type, b: &Type) -> bool {
    a.to_token_stream().to_string() == b.to_token_stream().to_string()
}
