//! Derives the conversions from a state change or event payload into its enum variant.
//!
//! The payload type name must match the variant name.
use proc_macro::TokenStream;
use quote::quote;
use syn::{
	parse_macro_input,
	Data,
	DataEnum,
	DeriveInput,
	Fields,
};

fn enum_data(input: &DeriveInput) -> Result<&DataEnum, TokenStream> {
	match &input.data {
		Data::Enum(data) => Ok(data),
		_ => Err(syn::Error::new_spanned(&input.ident, "only enums are supported")
			.to_compile_error()
			.into()),
	}
}

/// Implements `type_name()`, which returns the name of the active variant.
#[proc_macro_derive(TypeName)]
pub fn type_name(input: TokenStream) -> TokenStream {
	let input = parse_macro_input!(input as DeriveInput);
	let data = match enum_data(&input) {
		Ok(data) => data,
		Err(error) => return error,
	};
	let name = &input.ident;

	let arms = data.variants.iter().map(|variant| {
		let ident = &variant.ident;
		let label = ident.to_string();
		match variant.fields {
			Fields::Unit => quote! { #name::#ident => #label },
			Fields::Unnamed(_) => quote! { #name::#ident(..) => #label },
			Fields::Named(_) => quote! { #name::#ident { .. } => #label },
		}
	});

	let expanded = quote! {
		impl #name {
			pub fn type_name(&self) -> &'static str {
				match self {
					#(#arms,)*
				}
			}
		}
	};

	TokenStream::from(expanded)
}

/// For an enum whose variants all exist on `Event` under the same name, implements
/// `From<T> for Event` and `TryFrom<Event> for T`.
#[proc_macro_derive(EventSubset)]
pub fn event_subset(input: TokenStream) -> TokenStream {
	let input = parse_macro_input!(input as DeriveInput);
	let data = match enum_data(&input) {
		Ok(data) => data,
		Err(error) => return error,
	};
	let name = &input.ident;

	let widen = data.variants.iter().map(|variant| {
		let ident = &variant.ident;
		quote! { #name::#ident(inner) => Event::#ident(inner) }
	});
	let narrow = data.variants.iter().map(|variant| {
		let ident = &variant.ident;
		quote! { Event::#ident(inner) => Ok(#name::#ident(inner)) }
	});

	let expanded = quote! {
		impl From<#name> for Event {
			fn from(event: #name) -> Event {
				match event {
					#(#widen,)*
				}
			}
		}

		impl TryFrom<Event> for #name {
			type Error = Event;

			fn try_from(event: Event) -> Result<Self, Self::Error> {
				match event {
					#(#narrow,)*
					other => Err(other),
				}
			}
		}
	};

	TokenStream::from(expanded)
}

/// Implements `From<T> for Event`.
#[proc_macro_derive(IntoEvent)]
pub fn into_event(input: TokenStream) -> TokenStream {
	let input = parse_macro_input!(input as DeriveInput);
	let name = input.ident;

	let expanded = quote! {
		impl From<#name> for Event {
			fn from(inner: #name) -> Event {
				Event::#name(inner)
			}
		}
	};

	TokenStream::from(expanded)
}

/// Implements `From<T> for StateChange`.
#[proc_macro_derive(IntoStateChange)]
pub fn into_state_change(input: TokenStream) -> TokenStream {
	let input = parse_macro_input!(input as DeriveInput);
	let name = input.ident;

	let expanded = quote! {
		impl From<#name> for StateChange {
			fn from(inner: #name) -> StateChange {
				StateChange::#name(inner)
			}
		}
	};

	TokenStream::from(expanded)
}

/// Implements `From<T> for Event` and `From<T> for SendMessageEvent`.
#[proc_macro_derive(IntoSendMessageEvent)]
pub fn into_send_message_event(input: TokenStream) -> TokenStream {
	let input = parse_macro_input!(input as DeriveInput);
	let name = input.ident;

	let expanded = quote! {
		impl From<#name> for Event {
			fn from(inner: #name) -> Event {
				Event::#name(inner)
			}
		}

		impl From<#name> for SendMessageEvent {
			fn from(inner: #name) -> SendMessageEvent {
				SendMessageEvent::#name(inner)
			}
		}
	};

	TokenStream::from(expanded)
}

/// Implements `From<T> for Event` and `From<T> for ContractSendEvent`.
#[proc_macro_derive(IntoContractSendEvent)]
pub fn into_contract_send_event(input: TokenStream) -> TokenStream {
	let input = parse_macro_input!(input as DeriveInput);
	let name = input.ident;

	let expanded = quote! {
		impl From<#name> for Event {
			fn from(inner: #name) -> Event {
				Event::#name(inner)
			}
		}

		impl From<#name> for ContractSendEvent {
			fn from(inner: #name) -> ContractSendEvent {
				ContractSendEvent::#name(inner)
			}
		}
	};

	TokenStream::from(expanded)
}
